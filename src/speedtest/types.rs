//! 测速服务器类型定义

use serde::Deserialize;

/// 测速服务器（speedtest.net 服务器列表条目）
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerInfo {
    /// 上传地址，形如 http://host:8080/speedtest/upload.php
    pub url: String,
    /// 城市名
    pub name: String,
    pub country: String,
    /// 运营方
    pub sponsor: String,
    #[serde(default)]
    pub host: String,
}

impl ServerInfo {
    /// 测速文件所在目录（upload.php 的上级路径）
    pub fn base_url(&self) -> &str {
        self.url
            .rsplit_once('/')
            .map(|(base, _)| base)
            .unwrap_or(&self.url)
    }

    /// 显示用位置，格式为 "城市, 国家"
    pub fn location(&self) -> String {
        format!("{}, {}", self.name, self.country)
    }
}

/// 选中的服务器及其平均延迟
#[derive(Debug, Clone, PartialEq)]
pub struct BestServer {
    pub server: ServerInfo,
    pub latency_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(url: &str) -> ServerInfo {
        ServerInfo {
            url: url.to_string(),
            name: "Frankfurt".to_string(),
            country: "Germany".to_string(),
            sponsor: "Example ISP".to_string(),
            host: "speed.example.net:8080".to_string(),
        }
    }

    #[test]
    fn test_base_url_strips_upload_script() {
        let s = server("http://speed.example.net:8080/speedtest/upload.php");
        assert_eq!(s.base_url(), "http://speed.example.net:8080/speedtest");
    }

    #[test]
    fn test_location_format() {
        assert_eq!(server("http://x/upload.php").location(), "Frankfurt, Germany");
    }

    #[test]
    fn test_deserialize_server_list_entry() {
        let json = r#"{
            "url": "http://speed.example.net:8080/speedtest/upload.php",
            "lat": "50.1109",
            "lon": "8.6821",
            "distance": 12,
            "name": "Frankfurt",
            "country": "Germany",
            "cc": "DE",
            "sponsor": "Example ISP",
            "id": "12345",
            "host": "speed.example.net:8080"
        }"#;
        let parsed: ServerInfo = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.sponsor, "Example ISP");
        assert_eq!(parsed.host, "speed.example.net:8080");
    }
}
