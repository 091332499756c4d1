//! API 共享状态和认证中间件

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};

use super::types::ApiErrorResponse;
use crate::common::auth;
use crate::results::ResultService;
use crate::scheduler::SchedulerHandle;

/// API 共享状态
#[derive(Clone)]
pub struct ApiState {
    pub results: ResultService,
    pub scheduler: SchedulerHandle,
    /// 手动触发所需的 API 密钥，None 时不校验
    pub api_key: Option<String>,
    pub default_display_count: u32,
}

/// 写操作认证中间件
pub async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    match auth::extract_api_key(&request) {
        Some(key) if auth::constant_time_eq(&key, expected) => next.run(request).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(ApiErrorResponse::new(
                "authentication_error",
                "Invalid API key",
            )),
        )
            .into_response(),
    }
}
