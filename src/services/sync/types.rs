use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::services::registry::{RegistryError, ServiceInstance};

/// 同步动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Register,
    Unregister,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Register => "register",
            SyncAction::Unregister => "unregister",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "register" => Ok(SyncAction::Register),
            "unregister" => Ok(SyncAction::Unregister),
            other => Err(RegistryError::UnknownAction(other.to_string())),
        }
    }
}

/// 同步线格式中的服务实例，额外携带毫秒级心跳时间戳
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedInstance {
    #[serde(default)]
    pub service_name: String,
    pub service_id: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<u64>,
}

impl SyncedInstance {
    /// 转换为本地实例；心跳时间戳缺失或为 0 时取 `now`，避免被立即清理
    pub fn into_instance(self, now: SystemTime) -> Result<ServiceInstance, RegistryError> {
        if self.service_name.is_empty() {
            return Err(RegistryError::Validation("serviceName is required".into()));
        }
        if self.service_id.is_empty() {
            return Err(RegistryError::Validation("serviceId is required".into()));
        }
        if self.ip_address.is_empty() {
            return Err(RegistryError::Validation("ipAddress is required".into()));
        }
        if self.port == 0 {
            return Err(RegistryError::Validation("port must be greater than 0".into()));
        }

        let last_heartbeat = match self.last_heartbeat {
            Some(millis) if millis > 0 => UNIX_EPOCH + Duration::from_millis(millis),
            _ => now,
        };

        Ok(ServiceInstance {
            service_name: self.service_name,
            service_id: self.service_id,
            ip_address: self.ip_address,
            port: self.port,
            last_heartbeat,
        })
    }
}

impl From<&ServiceInstance> for SyncedInstance {
    fn from(instance: &ServiceInstance) -> Self {
        let last_heartbeat = instance
            .last_heartbeat
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|elapsed| elapsed.as_millis() as u64);

        Self {
            service_name: instance.service_name.clone(),
            service_id: instance.service_id.clone(),
            ip_address: instance.ip_address.clone(),
            port: instance.port,
            last_heartbeat,
        }
    }
}

/// 单条变更同步消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMessage {
    pub service: SyncedInstance,
    // 保留原始字符串，未知动作在应用时作为协议错误拒绝
    pub action: String,
}

impl SyncMessage {
    pub fn new(service: SyncedInstance, action: SyncAction) -> Self {
        Self {
            service,
            action: action.as_str().to_string(),
        }
    }
}

/// 全量同步请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncBatch {
    pub services: Vec<SyncedInstance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub code: u16,
    pub message: String,
}

impl SyncResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            code: 200,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synced(last_heartbeat: Option<u64>) -> SyncedInstance {
        SyncedInstance {
            service_name: "time-service".into(),
            service_id: "A".into(),
            ip_address: "10.0.0.1".into(),
            port: 8280,
            last_heartbeat,
        }
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("register".parse::<SyncAction>().unwrap(), SyncAction::Register);
        assert_eq!("unregister".parse::<SyncAction>().unwrap(), SyncAction::Unregister);
        assert!(matches!(
            "Register".parse::<SyncAction>(),
            Err(RegistryError::UnknownAction(action)) if action == "Register"
        ));
    }

    #[test]
    fn test_missing_or_zero_heartbeat_is_stamped_now() {
        let now = SystemTime::now();
        assert_eq!(synced(None).into_instance(now).unwrap().last_heartbeat, now);
        assert_eq!(synced(Some(0)).into_instance(now).unwrap().last_heartbeat, now);
    }

    #[test]
    fn test_heartbeat_timestamp_survives_wire() {
        let millis = 1_700_000_000_123;
        let instance = synced(Some(millis)).into_instance(SystemTime::now()).unwrap();
        assert_eq!(
            instance.last_heartbeat,
            UNIX_EPOCH + Duration::from_millis(millis)
        );
        assert_eq!(SyncedInstance::from(&instance).last_heartbeat, Some(millis));
    }

    #[test]
    fn test_message_wire_format() {
        let message: SyncMessage = serde_json::from_value(serde_json::json!({
            "service": {"serviceId": "A"},
            "action": "unregister"
        }))
        .unwrap();
        assert_eq!(message.service.service_id, "A");
        assert_eq!(message.service.last_heartbeat, None);

        let encoded = serde_json::to_value(SyncMessage::new(synced(None), SyncAction::Register)).unwrap();
        assert_eq!(encoded["action"], "register");
        assert!(encoded["service"].get("lastHeartbeat").is_none());
    }
}
