use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::services::client::HttpClientConfig;
use crate::services::registry::RegistrySettings;
use crate::services::sync::SyncSettings;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 配置加载错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid environment variable: {0}")]
    Env(#[from] envy::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub sync: SyncConfig,
    pub http_client: HttpClientSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8180,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub heartbeat_ttl_seconds: u64,
    pub cleanup_period_seconds: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_ttl_seconds: 180,
            cleanup_period_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub peers: Vec<String>,
    pub interval_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            interval_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientSection {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for HttpClientSection {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

/// 环境变量覆盖项，原样读取字符串，解析失败时告警并保留原值
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvOverrides {
    pub registry_config: Option<String>,
    pub registry_port: Option<String>,
    pub heartbeat_ttl_seconds: Option<String>,
    pub cleanup_period_seconds: Option<String>,
    /// 逗号分隔的对端地址
    pub sync_addresses: Option<String>,
    pub sync_interval_seconds: Option<String>,
}

// 解析正整数覆盖值；非法值（非数字或 0）返回 None 并告警
fn parse_positive<T>(name: &str, raw: &str) -> Option<T>
where
    T: FromStr + PartialEq + Default,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => Some(value),
        _ => {
            tracing::warn!(name, value = %raw, "Invalid environment override, keeping current value");
            None
        }
    }
}

impl Config {
    /// 读取配置文件（不存在时使用默认值），再应用环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let overrides: EnvOverrides = envy::from_env()?;
        let path = overrides
            .registry_config
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            tracing::info!(path = %path, "Loading config file");
            Self::from_toml_str(&fs::read_to_string(&path)?)?
        } else {
            tracing::debug!(path = %path, "Config file not found, using defaults");
            Self::default()
        };

        config.apply_overrides(overrides);
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_overrides(&mut self, overrides: EnvOverrides) {
        if let Some(port) = overrides
            .registry_port
            .and_then(|raw| parse_positive("REGISTRY_PORT", &raw))
        {
            self.server.port = port;
        }
        if let Some(ttl) = overrides
            .heartbeat_ttl_seconds
            .and_then(|raw| parse_positive("HEARTBEAT_TTL_SECONDS", &raw))
        {
            self.registry.heartbeat_ttl_seconds = ttl;
        }
        if let Some(period) = overrides
            .cleanup_period_seconds
            .and_then(|raw| parse_positive("CLEANUP_PERIOD_SECONDS", &raw))
        {
            self.registry.cleanup_period_seconds = period;
        }
        if let Some(peers) = overrides.sync_addresses {
            self.sync.peers = peers
                .split(',')
                .map(|peer| peer.trim().to_string())
                .filter(|peer| !peer.is_empty())
                .collect();
        }
        if let Some(interval) = overrides
            .sync_interval_seconds
            .and_then(|raw| parse_positive("SYNC_INTERVAL_SECONDS", &raw))
        {
            self.sync.interval_seconds = interval;
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            heartbeat_ttl: Duration::from_secs(self.registry.heartbeat_ttl_seconds.max(1)),
            cleanup_period: Duration::from_secs(self.registry.cleanup_period_seconds.max(1)),
        }
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            peers: self.sync.peers.clone(),
            interval: Duration::from_secs(self.sync.interval_seconds.max(1)),
        }
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_millis(self.http_client.timeout_ms),
            max_retries: self.http_client.max_retries,
            retry_delay: Duration::from_millis(self.http_client.retry_delay_ms),
        }
    }
}
