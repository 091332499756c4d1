//! 测速结果模块
//!
//! 单表 SQLite 存储，只追加、按 id 倒序读取

pub mod model;
pub mod store;
pub mod table;

pub use store::{ResultService, ResultStore};
