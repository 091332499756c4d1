//! 测速记录数据模型

use serde::{Deserialize, Serialize};

/// 时间戳格式（本地时间，精确到秒）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 已持久化的测速记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    pub id: i64,
    pub timestamp: String,
    /// 下载速率（Mbps）
    pub download: f64,
    /// 上传速率（Mbps）
    pub upload: f64,
    /// 延迟（毫秒）
    pub ping: f64,
    pub server_name: String,
    pub server_location: String,
}

/// 待写入的测速结果（尚未分配 id）
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub timestamp: String,
    pub download: f64,
    pub upload: f64,
    pub ping: f64,
    pub server_name: String,
    pub server_location: String,
}

impl NewMeasurement {
    /// 附加存储分配的 id
    pub fn into_record(self, id: i64) -> MeasurementRecord {
        MeasurementRecord {
            id,
            timestamp: self.timestamp,
            download: self.download,
            upload: self.upload,
            ping: self.ping,
            server_name: self.server_name,
            server_location: self.server_location,
        }
    }
}
