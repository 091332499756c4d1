use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TlsBackend {
    Rustls,
    NativeTls,
}

impl Default for TlsBackend {
    fn default() -> Self {
        Self::Rustls
    }
}

/// 测速参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeedTestConfig {
    /// 测速服务器列表地址
    #[serde(default = "default_server_list_url")]
    pub server_list_url: String,
    /// 参与延迟比较的候选服务器数量
    #[serde(default = "default_candidate_servers")]
    pub candidate_servers: usize,
    /// 每台候选服务器的延迟探测次数
    #[serde(default = "default_latency_probes")]
    pub latency_probes: usize,
    /// 下载测速图片边长（random{N}x{N}.jpg）
    #[serde(default = "default_download_sizes")]
    pub download_sizes: Vec<u32>,
    /// 上传测速负载大小（字节）
    #[serde(default = "default_upload_sizes")]
    pub upload_sizes: Vec<usize>,
    /// 单个 HTTP 请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_server_list_url() -> String {
    "https://www.speedtest.net/api/js/servers?engine=js".to_string()
}

fn default_candidate_servers() -> usize {
    5
}

fn default_latency_probes() -> usize {
    3
}

fn default_download_sizes() -> Vec<u32> {
    vec![350, 500, 750, 1000, 1500, 2000]
}

fn default_upload_sizes() -> Vec<usize> {
    vec![250_000, 500_000, 1_000_000, 2_000_000]
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for SpeedTestConfig {
    fn default() -> Self {
        Self {
            server_list_url: default_server_list_url(),
            candidate_servers: default_candidate_servers(),
            latency_probes: default_latency_probes(),
            download_sizes: default_download_sizes(),
            upload_sizes: default_upload_sizes(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// speedlog 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite 数据库文件路径
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// 定时测速间隔（秒）
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// 页面默认显示的记录条数
    #[serde(default = "default_display_count")]
    pub default_display_count: u32,

    #[serde(default = "default_tls_backend")]
    pub tls_backend: TlsBackend,

    /// HTTP 代理地址（可选）
    /// 支持格式: http://host:port, https://host:port, socks5://host:port
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// 手动触发测速所需的 API 密钥（可选，未配置时不校验）
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub speedtest: SpeedTestConfig,

    /// 配置文件路径（运行时元数据，不写入 JSON）
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

/// 页面可选的显示条数
pub const DISPLAY_CHOICES: [u32; 3] = [5, 10, 20];

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_db_path() -> PathBuf {
    PathBuf::from("speedtest_results.db")
}

fn default_interval_secs() -> u64 {
    60
}

fn default_display_count() -> u32 {
    DISPLAY_CHOICES[0]
}

fn default_tls_backend() -> TlsBackend {
    TlsBackend::Rustls
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            interval_secs: default_interval_secs(),
            default_display_count: default_display_count(),
            tls_backend: default_tls_backend(),
            proxy_url: None,
            api_key: None,
            speedtest: SpeedTestConfig::default(),
            config_path: None,
        }
    }
}

impl Config {
    /// 获取默认配置文件路径
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// 从文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            // 配置文件不存在，返回默认配置
            let mut config = Self::default();
            config.config_path = Some(path.to_path_buf());
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        config.validate()?;
        Ok(config)
    }

    /// 校验取值范围
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval_secs == 0 {
            anyhow::bail!("intervalSecs 必须大于 0");
        }
        if !DISPLAY_CHOICES.contains(&self.default_display_count) {
            anyhow::bail!(
                "defaultDisplayCount 必须是 {:?} 之一，当前为 {}",
                DISPLAY_CHOICES,
                self.default_display_count
            );
        }
        if self.speedtest.candidate_servers == 0 || self.speedtest.latency_probes == 0 {
            anyhow::bail!("candidateServers 和 latencyProbes 必须大于 0");
        }
        if self.speedtest.download_sizes.is_empty() || self.speedtest.upload_sizes.is_empty() {
            anyhow::bail!("downloadSizes 和 uploadSizes 不能为空");
        }
        Ok(())
    }

    /// 获取配置文件路径（如果有）
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 将当前配置写回原始配置文件
    pub fn save(&self) -> anyhow::Result<()> {
        let path = self
            .config_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("配置文件路径未知，无法保存配置"))?;

        let content = serde_json::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, content)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
        Ok(())
    }
}
