//! API 请求/响应类型

use serde::{Deserialize, Serialize};

use crate::results::model::MeasurementRecord;
use crate::scheduler::StatusSnapshot;

/// GET /api/results 查询参数
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsQuery {
    pub limit: Option<u32>,
}

/// 测速记录列表
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub records: Vec<MeasurementRecord>,
}

/// 调度器状态
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: StatusSnapshot,
    pub total_records: u64,
    pub interval_secs: u64,
    pub display_choices: Vec<u32>,
    pub default_display_count: u32,
}

/// 手动触发响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub accepted: bool,
    pub message: String,
}

/// 错误响应
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl ApiErrorResponse {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorBody {
                kind: kind.into(),
                message: message.into(),
            },
        }
    }
}
