/// 客户端错误类型
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Server returned error: {message} (status: {status})")]
    Server { url: String, status: u16, message: String },
    #[error("Request to {url} failed with status: {status}")]
    Status { url: String, status: u16 },
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Giving up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<ClientError>,
    },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("No registry addresses configured")]
    NoRegistries,
}

impl ClientError {
    /// 最后一次尝试得到的 HTTP 状态码（若有）
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Server { status, .. } | ClientError::Status { status, .. } => Some(*status),
            ClientError::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}
