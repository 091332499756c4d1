//! 控制面板 API
//!
//! Input: ResultService, SchedulerHandle
//! Output: /api 路由
//! Pos: 查询测速记录、查看状态、手动触发测速

mod handlers;
mod middleware;
mod router;
pub mod types;

pub use middleware::ApiState;
pub use router::create_api_router;
