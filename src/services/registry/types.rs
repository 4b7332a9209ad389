use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

use super::error::RegistryError;

// 服务实例信息，以 service_id 为键存储
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstance {
    pub service_name: String,
    pub service_id: String,
    pub ip_address: String,
    pub port: u16,
    // 最后一次心跳时间，仅用于内部管理
    #[serde(skip, default = "SystemTime::now")]
    pub last_heartbeat: SystemTime,
}

impl ServiceInstance {
    /// 距离上次心跳经过的时间；心跳时间晚于 `now`（对端时钟偏差）时视为 0
    pub fn elapsed_since_heartbeat(&self, now: SystemTime) -> Duration {
        now.duration_since(self.last_heartbeat).unwrap_or_default()
    }

    pub fn is_alive_at(&self, now: SystemTime, ttl: Duration) -> bool {
        self.elapsed_since_heartbeat(now) <= ttl
    }

    pub fn matches_endpoint(&self, ip_address: &str, port: u16) -> bool {
        self.ip_address == ip_address && self.port == port
    }
}

/// 注册 / 注销请求（两者共用同一结构）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterServiceRequest {
    pub service_name: String,
    pub service_id: String,
    pub ip_address: String,
    pub port: i64,
}

impl RegisterServiceRequest {
    /// 校验字段并转换为服务实例
    pub fn into_instance(self, now: SystemTime) -> Result<ServiceInstance, RegistryError> {
        if self.service_name.is_empty() {
            return Err(RegistryError::Validation("serviceName is required".into()));
        }
        if self.service_id.is_empty() {
            return Err(RegistryError::Validation("serviceId is required".into()));
        }
        let port = validate_endpoint(&self.ip_address, self.port)?;

        Ok(ServiceInstance {
            service_name: self.service_name,
            service_id: self.service_id,
            ip_address: self.ip_address,
            port,
            last_heartbeat: now,
        })
    }
}

impl From<&ServiceInstance> for RegisterServiceRequest {
    fn from(instance: &ServiceInstance) -> Self {
        Self {
            service_name: instance.service_name.clone(),
            service_id: instance.service_id.clone(),
            ip_address: instance.ip_address.clone(),
            port: i64::from(instance.port),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterServiceResponse {
    pub message: String,
    pub service: ServiceInstance,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeartbeatRequest {
    pub service_id: String,
    pub ip_address: String,
    pub port: i64,
}

impl HeartbeatRequest {
    /// 校验字段，返回合法端口号
    pub fn validate(&self) -> Result<u16, RegistryError> {
        if self.service_id.is_empty() {
            return Err(RegistryError::Validation("serviceId is required".into()));
        }
        validate_endpoint(&self.ip_address, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub message: String,
    pub service_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryQuery {
    pub name: Option<String>,
}

/// 服务发现响应（单个实例）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResponse {
    pub service_name: String,
    pub service_id: String,
    pub ip_address: String,
    pub port: u16,
}

impl From<ServiceInstance> for DiscoveryResponse {
    fn from(instance: ServiceInstance) -> Self {
        Self {
            service_name: instance.service_name,
            service_id: instance.service_id,
            ip_address: instance.ip_address,
            port: instance.port,
        }
    }
}

/// 服务发现响应（所有实例）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryListResponse {
    pub services: Vec<ServiceInstance>,
}

/// 通用的错误响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub error: String,
}

fn validate_endpoint(ip_address: &str, port: i64) -> Result<u16, RegistryError> {
    if ip_address.is_empty() {
        return Err(RegistryError::Validation("ipAddress is required".into()));
    }
    if port <= 0 {
        return Err(RegistryError::Validation("port must be greater than 0".into()));
    }
    u16::try_from(port)
        .map_err(|_| RegistryError::Validation(format!("port {port} is out of range")))
}
