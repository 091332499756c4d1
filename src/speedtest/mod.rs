//! 测速能力模块
//!
//! 选择最佳测速服务器并测量下载、上传速率和延迟。
//! 速率以 bit/s 为单位上报，单位换算由调用方负责。

mod client;
pub mod types;

pub use client::HttpSpeedTester;
pub use types::{BestServer, ServerInfo};

/// 外部测速能力
#[async_trait::async_trait]
pub trait SpeedTester: Send + Sync {
    /// 选择延迟最低的测速服务器
    async fn select_best_server(&self) -> anyhow::Result<BestServer>;

    /// 下载速率（bit/s）
    async fn download(&self, server: &ServerInfo) -> anyhow::Result<f64>;

    /// 上传速率（bit/s）
    async fn upload(&self, server: &ServerInfo) -> anyhow::Result<f64>;
}
