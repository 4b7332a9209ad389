use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::ClientError;
use super::http_client::HttpClient;
use crate::services::registry::{
    DiscoveryListResponse, DiscoveryResponse, HeartbeatRequest, HeartbeatResponse,
    RegisterServiceRequest, RegisterServiceResponse, ServiceInstance,
};

/// 本服务实例在注册中心的登记信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub service_name: String,
    pub service_id: String,
    pub ip_address: String,
    pub port: u16,
}

impl Registration {
    /// 使用随机 UUID 作为实例 ID
    pub fn new(service_name: &str, ip_address: &str, port: u16) -> Self {
        Self {
            service_name: service_name.to_string(),
            service_id: Uuid::new_v4().to_string(),
            ip_address: ip_address.to_string(),
            port,
        }
    }

    fn register_request(&self) -> RegisterServiceRequest {
        RegisterServiceRequest {
            service_name: self.service_name.clone(),
            service_id: self.service_id.clone(),
            ip_address: self.ip_address.clone(),
            port: i64::from(self.port),
        }
    }

    fn heartbeat_request(&self) -> HeartbeatRequest {
        HeartbeatRequest {
            service_id: self.service_id.clone(),
            ip_address: self.ip_address.clone(),
            port: i64::from(self.port),
        }
    }
}

/// 依赖服务使用的注册中心客户端：注册、心跳、注销与服务发现
#[derive(Debug, Clone)]
pub struct RegistryClient {
    registries: Vec<String>,
    http: HttpClient,
}

impl RegistryClient {
    pub fn new(registries: Vec<String>, http: HttpClient) -> Result<Self, ClientError> {
        let registries: Vec<String> = registries
            .into_iter()
            .map(|addr| addr.trim().trim_end_matches('/').to_string())
            .filter(|addr| !addr.is_empty())
            .collect();
        if registries.is_empty() {
            return Err(ClientError::NoRegistries);
        }

        Ok(Self { registries, http })
    }

    pub fn registries(&self) -> &[String] {
        &self.registries
    }

    /// 生成实例 ID 并向所有注册中心注册
    pub async fn register(
        &self,
        service_name: &str,
        ip_address: &str,
        port: u16,
    ) -> Result<Registration, ClientError> {
        let registration = Registration::new(service_name, ip_address, port);
        self.register_instance(&registration).await?;
        Ok(registration)
    }

    /// 向所有注册中心注册，任一失败即返回错误
    pub async fn register_instance(&self, registration: &Registration) -> Result<(), ClientError> {
        let request = registration.register_request();
        for registry in &self.registries {
            let url = format!("{registry}/api/register");
            let response: RegisterServiceResponse = self.http.post(&url, &request).await?;
            tracing::info!(
                registry = %registry,
                service_name = %registration.service_name,
                service_id = %registration.service_id,
                message = %response.message,
                "Service registered"
            );
        }
        Ok(())
    }

    /// 向所有注册中心发送一次心跳，返回成功的数量
    pub async fn heartbeat(&self, registration: &Registration) -> usize {
        let request = registration.heartbeat_request();
        let mut acknowledged = 0;

        for registry in &self.registries {
            let url = format!("{registry}/api/heartbeat");
            match self.http.post::<_, HeartbeatResponse>(&url, &request).await {
                Ok(response) => {
                    tracing::debug!(registry = %registry, service_id = %response.service_id, "Heartbeat sent");
                    acknowledged += 1;
                }
                Err(e) => {
                    tracing::error!(
                        registry = %registry,
                        service_id = %registration.service_id,
                        error = %e,
                        "Failed to send heartbeat"
                    );
                }
            }
        }

        acknowledged
    }

    /// 启动周期心跳任务
    pub fn start_heartbeat(&self, registration: Registration, interval: Duration) -> HeartbeatHandle {
        let client = self.clone();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 刚注册完，跳过立即触发的第一次 tick
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!(service_id = %registration.service_id, "Heartbeat stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        client.heartbeat(&registration).await;
                    }
                }
            }
        });

        HeartbeatHandle { shutdown, task }
    }

    /// 从所有注册中心注销，失败仅记录日志
    pub async fn unregister(&self, registration: &Registration) {
        let request = registration.register_request();
        for registry in &self.registries {
            let url = format!("{registry}/api/unregister");
            match self.http.post::<_, RegisterServiceResponse>(&url, &request).await {
                Ok(response) => {
                    tracing::info!(registry = %registry, message = %response.message, "Service unregistered");
                }
                Err(e) => {
                    tracing::error!(
                        registry = %registry,
                        service_id = %registration.service_id,
                        error = %e,
                        "Failed to unregister service"
                    );
                }
            }
        }
    }

    /// 依次尝试各注册中心，返回第一个有效的实例
    pub async fn discover(&self, service_name: &str) -> Result<DiscoveryResponse, ClientError> {
        let mut last_error = ClientError::NoRegistries;
        let query = [("name", service_name)];

        for registry in &self.registries {
            let url = format!("{registry}/api/discovery");
            match self.http.get_with_query::<_, DiscoveryResponse>(&url, &query).await {
                Ok(found) if is_valid_instance(&found) => return Ok(found),
                Ok(found) => {
                    tracing::warn!(registry = %registry, instance = ?found, "Discovered instance has invalid information");
                    last_error = ClientError::InvalidResponse(format!(
                        "discovered '{service_name}' instance has invalid information"
                    ));
                }
                Err(e) => {
                    tracing::warn!(registry = %registry, service_name = %service_name, error = %e, "Discovery failed, trying next registry");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// 获取全部实例（未做健康过滤），使用第一个可用的注册中心
    pub async fn discover_all(&self) -> Result<Vec<ServiceInstance>, ClientError> {
        let mut last_error = ClientError::NoRegistries;

        for registry in &self.registries {
            let url = format!("{registry}/api/discovery");
            match self.http.get::<DiscoveryListResponse>(&url).await {
                Ok(list) => return Ok(list.services),
                Err(e) => {
                    tracing::warn!(registry = %registry, error = %e, "Listing services failed, trying next registry");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

fn is_valid_instance(found: &DiscoveryResponse) -> bool {
    !found.service_id.is_empty() && !found.ip_address.is_empty() && found.port > 0
}

/// 周期心跳任务句柄
#[derive(Debug)]
pub struct HeartbeatHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// 停止心跳并等待任务退出
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Heartbeat task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::client::HttpClientConfig;

    #[test]
    fn test_requires_registry_address() {
        let http = HttpClient::new(HttpClientConfig::default()).unwrap();
        assert!(matches!(
            RegistryClient::new(vec![" ".into()], http.clone()),
            Err(ClientError::NoRegistries)
        ));

        let client = RegistryClient::new(vec!["http://127.0.0.1:8180/".into()], http).unwrap();
        assert_eq!(client.registries(), ["http://127.0.0.1:8180"]);
    }

    #[test]
    fn test_registration_generates_unique_ids() {
        let a = Registration::new("time-service", "10.0.0.1", 8280);
        let b = Registration::new("time-service", "10.0.0.1", 8280);
        assert_ne!(a.service_id, b.service_id);
        assert_eq!(a.register_request().port, 8280);
    }
}
