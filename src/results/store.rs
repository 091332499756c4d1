//! 测速结果存储和异步服务

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;

use super::model::{MeasurementRecord, NewMeasurement};

/// 数据库被其他连接锁定时的等待时间
const BUSY_TIMEOUT_MS: u64 = 5_000;

/// 底层 SQLite 存储（同步）
///
/// 不持有长连接，每次操作单独打开数据库文件
#[derive(Debug, Clone)]
pub struct ResultStore {
    db_path: PathBuf,
}

impl ResultStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("failed to open database {}", self.db_path.display()))?;
        conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
        Ok(conn)
    }

    /// 确保 results 表存在（幂等）
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.open()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT,
                download REAL,
                upload REAL,
                ping REAL,
                server_name TEXT,
                server_location TEXT
            );",
        )
        .context("创建 results 表失败")?;
        Ok(())
    }

    /// 追加一条记录，返回带 id 的完整记录
    pub fn insert(&self, measurement: NewMeasurement) -> Result<MeasurementRecord> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO results (timestamp, download, upload, ping, server_name, server_location)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                measurement.timestamp,
                measurement.download,
                measurement.upload,
                measurement.ping,
                measurement.server_name,
                measurement.server_location,
            ],
        )
        .context("failed to save result")?;
        let id = conn.last_insert_rowid();
        Ok(measurement.into_record(id))
    }

    /// 按 id 倒序返回最近 `limit` 条记录
    pub fn list_recent(&self, limit: u32) -> Result<Vec<MeasurementRecord>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, download, upload, ping, server_name, server_location
             FROM results ORDER BY id DESC LIMIT ?1",
        )?;
        let records = stmt
            .query_map([limit as i64], |row| {
                Ok(MeasurementRecord {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    download: row.get(2)?,
                    upload: row.get(3)?,
                    ping: row.get(4)?,
                    server_name: row.get(5)?,
                    server_location: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("读取测速结果失败")?;
        Ok(records)
    }

    /// 记录总数
    pub fn count(&self) -> Result<u64> {
        let conn = self.open()?;
        let total: u64 = conn.query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))?;
        Ok(total)
    }
}

/// 异步结果服务（公开 API）
///
/// SQLite 调用放到阻塞线程池执行，避免占用异步运行时
#[derive(Debug, Clone)]
pub struct ResultService {
    store: Arc<ResultStore>,
}

impl ResultService {
    pub fn new(store: ResultStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.ensure_schema()).await?
    }

    pub async fn insert(&self, measurement: NewMeasurement) -> Result<MeasurementRecord> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.insert(measurement)).await?
    }

    pub async fn list_recent(&self, limit: u32) -> Result<Vec<MeasurementRecord>> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.list_recent(limit)).await?
    }

    pub async fn count(&self) -> Result<u64> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.count()).await?
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 临时目录下的独立数据库
    pub(crate) fn temp_store() -> ResultStore {
        let path = std::env::temp_dir().join(format!("speedlog-{}.db", uuid::Uuid::new_v4()));
        let store = ResultStore::new(path);
        store.ensure_schema().unwrap();
        store
    }

    pub(crate) fn sample(download: f64) -> NewMeasurement {
        NewMeasurement {
            timestamp: "2026-10-16 12:00:00".to_string(),
            download,
            upload: 10.0,
            ping: 12.3,
            server_name: "Example ISP".to_string(),
            server_location: "Berlin, Germany".to_string(),
        }
    }

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let store = temp_store();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();

        let conn = store.open().unwrap();
        let tables: u32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'results'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn test_list_recent_on_empty_store() {
        let store = temp_store();
        assert!(store.list_recent(5).unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let store = temp_store();
        let first = store.insert(sample(1.0)).unwrap();
        let second = store.insert(sample(2.0)).unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.server_location, "Berlin, Germany");
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_list_recent_is_bounded_and_descending() {
        let store = temp_store();
        for i in 0..7 {
            store.insert(sample(i as f64)).unwrap();
        }

        let recent = store.list_recent(5).unwrap();
        assert_eq!(recent.len(), 5);
        assert!(recent.windows(2).all(|w| w[0].id > w[1].id));
        assert_eq!(recent[0].download, 6.0);

        assert_eq!(store.list_recent(20).unwrap().len(), 7);
        assert!(store.list_recent(0).unwrap().is_empty());
    }

    #[test]
    fn test_insert_into_unavailable_path_fails() {
        let path = std::env::temp_dir()
            .join(format!("speedlog-missing-{}", uuid::Uuid::new_v4()))
            .join("results.db");
        let store = ResultStore::new(path);
        assert!(store.insert(sample(1.0)).is_err());
    }

    #[tokio::test]
    async fn test_service_round_trip() {
        let service = ResultService::new(temp_store());
        service.ensure_schema().await.unwrap();
        let record = service.insert(sample(42.0)).await.unwrap();

        let recent = service.list_recent(10).await.unwrap();
        assert_eq!(recent, vec![record]);
        assert_eq!(service.count().await.unwrap(), 1);
    }
}
