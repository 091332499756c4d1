//! API 处理器

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};

use super::middleware::ApiState;
use super::types::{ApiErrorResponse, ResultsQuery, ResultsResponse, RunResponse, StatusResponse};
use crate::model::config::DISPLAY_CHOICES;
use crate::scheduler::TriggerOutcome;

fn internal_error(message: String) -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiErrorResponse::new("internal_error", message)),
    )
        .into_response()
}

/// GET /api/results
pub async fn list_results(
    State(state): State<ApiState>,
    Query(query): Query<ResultsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(state.default_display_count);
    match state.results.list_recent(limit).await {
        Ok(records) => Json(ResultsResponse { records }).into_response(),
        Err(e) => {
            tracing::error!("查询测速记录失败: {:#}", e);
            internal_error(format!("查询失败: {}", e))
        }
    }
}

/// GET /api/status
pub async fn get_status(State(state): State<ApiState>) -> impl IntoResponse {
    let total_records = match state.results.count().await {
        Ok(n) => n,
        Err(e) => {
            tracing::error!("统计测速记录失败: {:#}", e);
            return internal_error(format!("统计失败: {}", e));
        }
    };

    Json(StatusResponse {
        status: state.scheduler.status(),
        total_records,
        interval_secs: state.scheduler.interval().as_secs(),
        display_choices: DISPLAY_CHOICES.to_vec(),
        default_display_count: state.default_display_count,
    })
    .into_response()
}

/// POST /api/run
pub async fn trigger_run(State(state): State<ApiState>) -> impl IntoResponse {
    match state.scheduler.trigger() {
        TriggerOutcome::Accepted => (
            StatusCode::ACCEPTED,
            Json(RunResponse {
                accepted: true,
                message: "Running speed test...".to_string(),
            }),
        )
            .into_response(),
        TriggerOutcome::AlreadyRunning => (
            StatusCode::CONFLICT,
            Json(RunResponse {
                accepted: false,
                message: "A speed test is already running".to_string(),
            }),
        )
            .into_response(),
        TriggerOutcome::Stopped => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiErrorResponse::new(
                "unavailable",
                "Scheduler has stopped",
            )),
        )
            .into_response(),
    }
}
