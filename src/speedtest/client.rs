//! 基于 speedtest.net 服务器网络的 HTTP 测速实现

use std::time::Instant;

use anyhow::Context;
use bytes::Bytes;
use futures::StreamExt;
use futures::future::{join_all, try_join_all};
use reqwest::Client;

use super::SpeedTester;
use super::types::{BestServer, ServerInfo};
use crate::model::config::SpeedTestConfig;

/// HTTP 测速器
pub struct HttpSpeedTester {
    client: Client,
    config: SpeedTestConfig,
}

impl HttpSpeedTester {
    pub fn new(client: Client, config: SpeedTestConfig) -> Self {
        Self { client, config }
    }

    /// 拉取服务器列表（按服务端给出的距离排序）
    async fn fetch_servers(&self) -> anyhow::Result<Vec<ServerInfo>> {
        let resp = self
            .client
            .get(&self.config.server_list_url)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("failed to fetch server list: {}", e))?;

        if !resp.status().is_success() {
            anyhow::bail!("failed to fetch server list: HTTP {}", resp.status());
        }

        resp.json::<Vec<ServerInfo>>()
            .await
            .context("invalid server list")
    }

    /// 多次请求 latency.txt，返回平均往返时间（毫秒）
    async fn probe_latency(&self, server: &ServerInfo) -> anyhow::Result<f64> {
        let url = format!("{}/latency.txt", server.base_url());
        let mut total_ms = 0.0;

        for _ in 0..self.config.latency_probes {
            let start = Instant::now();
            let resp = self
                .client
                .get(&url)
                .query(&[("x", fastrand::u64(..))])
                .send()
                .await?;
            if !resp.status().is_success() {
                anyhow::bail!("HTTP {}", resp.status());
            }
            resp.bytes().await?;
            total_ms += start.elapsed().as_secs_f64() * 1000.0;
        }

        Ok(total_ms / self.config.latency_probes as f64)
    }

    async fn download_one(&self, url: String) -> anyhow::Result<u64> {
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("download request failed: {}", e))?;

        if !resp.status().is_success() {
            anyhow::bail!("download failed: HTTP {} ({})", resp.status(), url);
        }

        let mut received: u64 = 0;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| anyhow::anyhow!("download interrupted: {}", e))?;
            received += chunk.len() as u64;
        }
        Ok(received)
    }

    async fn upload_one(&self, url: &str, payload: Bytes) -> anyhow::Result<u64> {
        let size = payload.len() as u64;
        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(payload)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("upload request failed: {}", e))?;

        if !resp.status().is_success() {
            anyhow::bail!("upload failed: HTTP {}", resp.status());
        }
        Ok(size)
    }
}

/// 随机字母数字上传负载
fn upload_payload(size: usize) -> Bytes {
    std::iter::repeat_with(|| fastrand::alphanumeric() as u8)
        .take(size)
        .collect::<Vec<u8>>()
        .into()
}

/// 传输字节数和耗时换算为 bit/s
fn bits_per_second(bytes: u64, elapsed_secs: f64) -> anyhow::Result<f64> {
    if elapsed_secs <= 0.0 {
        anyhow::bail!("transfer finished too quickly to measure");
    }
    Ok(bytes as f64 * 8.0 / elapsed_secs)
}

#[async_trait::async_trait]
impl SpeedTester for HttpSpeedTester {
    async fn select_best_server(&self) -> anyhow::Result<BestServer> {
        let servers = self.fetch_servers().await?;
        if servers.is_empty() {
            anyhow::bail!("no speed test servers available");
        }

        let candidates: Vec<ServerInfo> = servers
            .into_iter()
            .take(self.config.candidate_servers)
            .collect();
        let probes = join_all(candidates.iter().map(|s| self.probe_latency(s))).await;

        let mut best: Option<BestServer> = None;
        for (server, probe) in candidates.into_iter().zip(probes) {
            match probe {
                Ok(latency_ms) => {
                    tracing::debug!("服务器 {} ({}) 延迟 {:.2} ms", server.sponsor, server.host, latency_ms);
                    if best.as_ref().is_none_or(|b| latency_ms < b.latency_ms) {
                        best = Some(BestServer { server, latency_ms });
                    }
                }
                Err(e) => {
                    tracing::debug!("服务器 {} 延迟探测失败: {}", server.host, e);
                }
            }
        }

        let best = best.ok_or_else(|| anyhow::anyhow!("no candidate speed test server is reachable"))?;
        tracing::info!(
            "选定测速服务器: {} ({}), 延迟 {:.2} ms",
            best.server.sponsor,
            best.server.location(),
            best.latency_ms
        );
        Ok(best)
    }

    async fn download(&self, server: &ServerInfo) -> anyhow::Result<f64> {
        let base = server.base_url();
        let urls = self
            .config
            .download_sizes
            .iter()
            .map(|size| format!("{}/random{}x{}.jpg", base, size, size));

        let start = Instant::now();
        let received: u64 = try_join_all(urls.map(|url| self.download_one(url)))
            .await?
            .into_iter()
            .sum();
        let bps = bits_per_second(received, start.elapsed().as_secs_f64())?;
        tracing::debug!("下载 {} 字节, {:.0} bit/s", received, bps);
        Ok(bps)
    }

    async fn upload(&self, server: &ServerInfo) -> anyhow::Result<f64> {
        // 负载在计时开始前生成
        let payloads: Vec<Bytes> = self
            .config
            .upload_sizes
            .iter()
            .map(|size| upload_payload(*size))
            .collect();

        let start = Instant::now();
        let sent: u64 = try_join_all(
            payloads
                .into_iter()
                .map(|payload| self.upload_one(&server.url, payload)),
        )
        .await?
        .into_iter()
        .sum();
        let bps = bits_per_second(sent, start.elapsed().as_secs_f64())?;
        tracing::debug!("上传 {} 字节, {:.0} bit/s", sent, bps);
        Ok(bps)
    }
}
