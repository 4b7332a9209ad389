use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::config::HttpClientConfig;
use super::error::ClientError;
use crate::services::registry::ErrorResponse;

/// 带超时与固定间隔重试的 JSON HTTP 客户端
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, ClientError> {
        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self { inner, config })
    }

    /// 发送 GET 请求并解析 JSON 响应
    pub async fn get<R>(&self, url: &str) -> Result<R, ClientError>
    where
        R: DeserializeOwned,
    {
        let response = self.execute(url, || self.inner.get(url)).await?;
        Self::decode(url, response).await
    }

    /// 发送带查询参数的 GET 请求，参数由 reqwest 负责编码
    pub async fn get_with_query<Q, R>(&self, url: &str, query: &Q) -> Result<R, ClientError>
    where
        Q: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.execute(url, || self.inner.get(url).query(query)).await?;
        Self::decode(url, response).await
    }

    /// 发送 JSON POST 请求并解析 JSON 响应
    pub async fn post<T, R>(&self, url: &str, body: &T) -> Result<R, ClientError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.execute(url, || self.inner.post(url).json(body)).await?;
        Self::decode(url, response).await
    }

    // 重试直至成功；最后一次失败包装后返回
    async fn execute<F>(&self, url: &str, build_request: F) -> Result<Response, ClientError>
    where
        F: Fn() -> RequestBuilder,
    {
        let attempts = self.config.attempts();
        let mut attempt = 1;

        loop {
            match Self::send_once(url, build_request()).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < attempts => {
                    tracing::debug!(
                        url = %url,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(ClientError::RetriesExhausted {
                        url: url.to_string(),
                        attempts,
                        last: Box::new(e),
                    });
                }
            }
        }
    }

    async fn send_once(url: &str, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await.map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorResponse>()
            .await
            .ok()
            .map(|body| body.error)
            .filter(|error| !error.is_empty());

        Err(match message {
            Some(message) => ClientError::Server {
                url: url.to_string(),
                status: status.as_u16(),
                message,
            },
            None => ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            },
        })
    }

    async fn decode<R>(url: &str, response: Response) -> Result<R, ClientError>
    where
        R: DeserializeOwned,
    {
        response.json::<R>().await.map_err(|source| ClientError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
