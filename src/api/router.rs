//! API 路由

use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::handlers::{get_status, list_results, trigger_run};
use super::middleware::{ApiState, api_key_middleware};

/// 创建 API 路由
///
/// # 端点
/// - `GET /results?limit=N` - 最近 N 条测速记录（默认取配置的显示条数）
/// - `GET /status` - 当前测速状态
/// - `POST /run` - 手动触发测速（配置 apiKey 时需认证）
pub fn create_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/results", get(list_results))
        .route("/status", get(get_status))
        .route(
            "/run",
            post(trigger_run).route_layer(middleware::from_fn_with_state(
                state.clone(),
                api_key_middleware,
            )),
        )
        .with_state(state)
}
