//! 测速执行器
//!
//! 调用测速能力，将读数换算后写入结果存储。
//! 任何失败都在这里转换为 [`MeasurementFailure`]，不会留下残缺记录，也不重试。

use std::fmt;
use std::sync::Arc;

use chrono::Local;
use serde::Serialize;

use crate::results::ResultService;
use crate::results::model::{MeasurementRecord, NewMeasurement, TIMESTAMP_FORMAT};
use crate::speedtest::SpeedTester;

const BITS_PER_MEGABIT: f64 = 1_000_000.0;

/// 单次测速失败，序列化为 `{"error": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeasurementFailure {
    #[serde(rename = "error")]
    pub message: String,
}

impl MeasurementFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for MeasurementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for MeasurementFailure {}

/// 消息包含完整错误链，底层原因（如 SQLite 错误）不会被上下文覆盖
impl From<anyhow::Error> for MeasurementFailure {
    fn from(e: anyhow::Error) -> Self {
        Self::new(format!("{:#}", e))
    }
}

/// bit/s 换算为 Mbps
pub fn to_mbps(bits_per_second: f64) -> f64 {
    bits_per_second / BITS_PER_MEGABIT
}

pub struct MeasurementRunner {
    tester: Arc<dyn SpeedTester>,
    results: ResultService,
}

impl MeasurementRunner {
    pub fn new(tester: Arc<dyn SpeedTester>, results: ResultService) -> Self {
        Self { tester, results }
    }

    /// 执行一次完整测速：选服务器、下载、上传，成功后写入一条记录
    pub async fn run(&self) -> Result<MeasurementRecord, MeasurementFailure> {
        match self.measure_and_record().await {
            Ok(record) => {
                tracing::info!(
                    "测速完成: 下载 {:.2} Mbps, 上传 {:.2} Mbps, 延迟 {:.2} ms ({})",
                    record.download,
                    record.upload,
                    record.ping,
                    record.server_name
                );
                Ok(record)
            }
            Err(e) => {
                tracing::error!("测速失败: {:#}", e);
                Err(e.into())
            }
        }
    }

    async fn measure_and_record(&self) -> anyhow::Result<MeasurementRecord> {
        let best = self.tester.select_best_server().await?;
        let download = to_mbps(self.tester.download(&best.server).await?);
        let upload = to_mbps(self.tester.upload(&best.server).await?);

        let measurement = NewMeasurement {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            download,
            upload,
            ping: best.latency_ms,
            server_name: best.server.sponsor.clone(),
            server_location: best.server.location(),
        };

        self.results.insert(measurement).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::results::store::ResultStore;
    use crate::results::store::tests::temp_store;
    use crate::speedtest::{BestServer, ServerInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 可配置结果的测速能力
    pub(crate) struct MockSpeedTester {
        download_bps: f64,
        upload_bps: f64,
        ping_ms: f64,
        failure: Option<String>,
        delay: Option<Duration>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockSpeedTester {
        pub(crate) fn new(download_bps: f64, upload_bps: f64, ping_ms: f64) -> Self {
            Self {
                download_bps,
                upload_bps,
                ping_ms,
                failure: None,
                delay: None,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                failure: Some(message.to_string()),
                ..Self::new(0.0, 0.0, 0.0)
            }
        }

        /// 选择服务器阶段的模拟耗时
        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// 同时进行中的测速数量峰值
        pub(crate) fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl SpeedTester for MockSpeedTester {
        async fn select_best_server(&self) -> anyhow::Result<BestServer> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(message) = &self.failure {
                anyhow::bail!("{}", message);
            }
            Ok(BestServer {
                server: ServerInfo {
                    url: "http://speed.example.net:8080/speedtest/upload.php".to_string(),
                    name: "Berlin".to_string(),
                    country: "Germany".to_string(),
                    sponsor: "Example ISP".to_string(),
                    host: "speed.example.net:8080".to_string(),
                },
                latency_ms: self.ping_ms,
            })
        }

        async fn download(&self, _server: &ServerInfo) -> anyhow::Result<f64> {
            Ok(self.download_bps)
        }

        async fn upload(&self, _server: &ServerInfo) -> anyhow::Result<f64> {
            Ok(self.upload_bps)
        }
    }

    pub(crate) fn runner_with(tester: MockSpeedTester, store: ResultStore) -> MeasurementRunner {
        MeasurementRunner::new(Arc::new(tester), ResultService::new(store))
    }

    #[test]
    fn test_to_mbps() {
        assert_eq!(to_mbps(100_000_000.0), 100.0);
        assert_eq!(to_mbps(0.0), 0.0);
    }

    #[test]
    fn test_failure_serializes_as_error_descriptor() {
        let json = serde_json::to_value(MeasurementFailure::new("timeout")).unwrap();
        assert_eq!(json, serde_json::json!({"error": "timeout"}));
    }

    #[tokio::test]
    async fn test_successful_run_adds_exactly_one_row() {
        let store = temp_store();
        let runner = runner_with(MockSpeedTester::new(50e6, 10e6, 12.3), store.clone());

        let record = runner.run().await.unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(record.download, 50.0);
        assert_eq!(record.upload, 10.0);
        assert_eq!(record.ping, 12.3);
        assert_eq!(record.server_name, "Example ISP");
        assert_eq!(record.server_location, "Berlin, Germany");
        assert!(
            chrono::NaiveDateTime::parse_from_str(&record.timestamp, TIMESTAMP_FORMAT).is_ok()
        );
    }

    #[tokio::test]
    async fn test_end_to_end_fresh_store() {
        let store = temp_store();
        let runner = runner_with(MockSpeedTester::new(50e6, 10e6, 12.3), store.clone());
        let record = runner.run().await.unwrap();

        let recent = store.list_recent(5).unwrap();
        assert_eq!(recent.len(), 1);
        let row = &recent[0];
        assert_eq!(row, &record);
        assert_eq!(
            (row.download, row.upload, row.ping),
            (50.0, 10.0, 12.3)
        );
        assert_eq!(row.server_name, "Example ISP");
        assert_eq!(row.server_location, "Berlin, Germany");
    }

    #[tokio::test]
    async fn test_unit_conversion_on_store() {
        let store = temp_store();
        let runner = runner_with(MockSpeedTester::new(100_000_000.0, 1e6, 1.0), store.clone());
        runner.run().await.unwrap();

        assert_eq!(store.list_recent(1).unwrap()[0].download, 100.0);
    }

    #[tokio::test]
    async fn test_failed_run_returns_message_and_writes_nothing() {
        let store = temp_store();
        let runner = runner_with(MockSpeedTester::failing("timeout"), store.clone());

        let err = runner.run().await.unwrap_err();

        assert_eq!(err, MeasurementFailure::new("timeout"));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_is_a_measurement_failure() {
        let path = std::env::temp_dir()
            .join(format!("speedlog-missing-{}", uuid::Uuid::new_v4()))
            .join("results.db");
        let runner = runner_with(MockSpeedTester::new(1e6, 1e6, 1.0), ResultStore::new(path));

        let err = runner.run().await.unwrap_err();
        assert!(!err.message.is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_message_keeps_sqlite_cause() {
        let path = std::env::temp_dir().join(format!("speedlog-{}.db", uuid::Uuid::new_v4()));
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE unrelated (id INTEGER PRIMARY KEY);")
            .unwrap();
        let runner = runner_with(MockSpeedTester::new(1e6, 1e6, 1.0), ResultStore::new(path));

        let err = runner.run().await.unwrap_err();
        assert!(err.message.contains("failed to save result"), "{}", err.message);
        assert!(err.message.contains("no such table: results"), "{}", err.message);
    }

    #[test]
    fn test_failure_from_error_chain() {
        let err = anyhow::anyhow!("database is locked").context("failed to save result");
        let failure = MeasurementFailure::from(err);
        assert_eq!(failure.message, "failed to save result: database is locked");
    }

    #[tokio::test]
    async fn test_concurrent_runs_persist_distinct_rows() {
        let store = temp_store();
        let runner = runner_with(MockSpeedTester::new(20e6, 5e6, 8.0), store.clone());

        let (a, b) = tokio::join!(runner.run(), runner.run());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.id, b.id);
        assert_eq!(store.count().unwrap(), 2);
        let ids: Vec<i64> = store.list_recent(10).unwrap().iter().map(|r| r.id).collect();
        assert!(ids.contains(&a.id) && ids.contains(&b.id));
    }
}
