use std::time::Duration;

/// HTTP 客户端配置
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// 单次请求超时时间
    pub timeout: Duration,
    /// 最大重试次数（不含首次请求）
    pub max_retries: u32,
    /// 重试间隔
    pub retry_delay: Duration,
}

impl HttpClientConfig {
    /// 总尝试次数
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}
