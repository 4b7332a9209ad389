use std::time::{Duration, SystemTime};

use super::error::RegistryError;
use super::round_robin::RoundRobinSelector;
use super::store::ServiceStore;
use super::types::{HeartbeatRequest, RegisterServiceRequest, ServiceInstance};
use crate::services::sync::{SyncAction, SyncMessage, SyncedInstance};

/// 注册中心运行参数
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub heartbeat_ttl: Duration,
    pub cleanup_period: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            heartbeat_ttl: Duration::from_secs(180),
            cleanup_period: Duration::from_secs(60),
        }
    }
}

// 注册中心核心结构，每个进程构造一次并通过 Arc 共享
#[derive(Debug)]
pub struct ServiceRegistry {
    pub(super) store: ServiceStore,
    selector: RoundRobinSelector,
    pub(super) settings: RegistrySettings,
}

impl ServiceRegistry {
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            store: ServiceStore::new(),
            selector: RoundRobinSelector::new(),
            settings,
        }
    }

    // 注册服务，已存在的同 ID 记录被整体覆盖
    pub fn register(&self, request: RegisterServiceRequest) -> Result<ServiceInstance, RegistryError> {
        let instance = request.into_instance(SystemTime::now())?;

        tracing::info!(
            service_name = %instance.service_name,
            service_id = %instance.service_id,
            ip_address = %instance.ip_address,
            port = instance.port,
            "Registering service"
        );
        if self.store.put(instance.clone()).is_some() {
            tracing::debug!(service_id = %instance.service_id, "Replaced existing registration");
        }

        Ok(instance)
    }

    // 刷新心跳；ID 不存在或 IP/端口不匹配时不做任何修改
    pub fn heartbeat(&self, request: &HeartbeatRequest) -> Result<String, RegistryError> {
        let port = request.validate()?;
        let now = SystemTime::now();

        let refreshed = self
            .store
            .update(&request.service_id, |instance| {
                if !instance.matches_endpoint(&request.ip_address, port) {
                    return false;
                }
                instance.last_heartbeat = now;
                true
            })
            .ok_or(RegistryError::ServiceNotFound)?;

        if !refreshed {
            tracing::warn!(
                service_id = %request.service_id,
                ip_address = %request.ip_address,
                port = port,
                "Heartbeat rejected, endpoint does not match registration"
            );
            return Err(RegistryError::Mismatch);
        }

        tracing::debug!(service_id = %request.service_id, "Heartbeat received");
        Ok(request.service_id.clone())
    }

    // 注销服务，要求服务名、IP、端口与注册时完全一致
    pub fn unregister(&self, request: RegisterServiceRequest) -> Result<ServiceInstance, RegistryError> {
        let wanted = request.into_instance(SystemTime::now())?;
        let matches = |stored: &ServiceInstance| {
            stored.service_name == wanted.service_name
                && stored.matches_endpoint(&wanted.ip_address, wanted.port)
        };

        let stored = self
            .store
            .get(&wanted.service_id)
            .ok_or(RegistryError::ServiceNotFound)?;
        if !matches(&stored) {
            tracing::warn!(service_id = %wanted.service_id, "Unregister rejected, service information does not match");
            return Err(RegistryError::Mismatch);
        }

        // 检查与删除之间记录可能已被清理或覆盖
        let removed = self
            .store
            .delete_if(&wanted.service_id, matches)
            .ok_or(RegistryError::ServiceNotFound)?;

        tracing::info!(
            service_name = %removed.service_name,
            service_id = %removed.service_id,
            "Unregistered service"
        );
        Ok(removed)
    }

    /// 返回全部实例，不做健康过滤
    pub fn all_services(&self) -> Vec<ServiceInstance> {
        self.store.list_all()
    }

    pub fn get_service(&self, service_id: &str) -> Option<ServiceInstance> {
        self.store.get(service_id)
    }

    /// 指定服务名在 `now` 时刻的健康实例，按 service_id 排序
    pub fn healthy_instances_at(&self, service_name: &str, now: SystemTime) -> Vec<ServiceInstance> {
        let ttl = self.settings.heartbeat_ttl;
        let mut healthy: Vec<_> = self
            .store
            .list_all()
            .into_iter()
            .filter(|s| s.service_name == service_name && s.is_alive_at(now, ttl))
            .collect();
        healthy.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        healthy
    }

    // 获取指定服务名的健康实例（轮询负载均衡）
    pub fn discover(&self, service_name: &str) -> Result<ServiceInstance, RegistryError> {
        self.discover_at(service_name, SystemTime::now())
    }

    pub fn discover_at(&self, service_name: &str, now: SystemTime) -> Result<ServiceInstance, RegistryError> {
        let healthy = self.healthy_instances_at(service_name, now);
        self.selector
            .select(service_name, &healthy)
            .cloned()
            .ok_or_else(|| RegistryError::NoHealthyInstance(service_name.to_string()))
    }

    /// 应用来自对端注册中心的单条变更，不会再次向外推送
    pub fn apply_sync(&self, message: SyncMessage) -> Result<SyncAction, RegistryError> {
        let action: SyncAction = message.action.parse()?;

        match action {
            SyncAction::Register => {
                let instance = message.service.into_instance(SystemTime::now())?;
                tracing::info!(
                    service_name = %instance.service_name,
                    service_id = %instance.service_id,
                    "Applying synced registration"
                );
                self.store.put(instance);
            }
            SyncAction::Unregister => {
                let service_id = message.service.service_id;
                if service_id.is_empty() {
                    return Err(RegistryError::Validation("serviceId is required".into()));
                }
                let removed = self.store.delete(&service_id).is_some();
                tracing::info!(service_id = %service_id, removed, "Applying synced unregistration");
            }
        }

        Ok(action)
    }

    /// 合并对端推送的完整实例列表（对端记录无条件覆盖本地），返回合并数量
    pub fn merge_services(&self, services: Vec<SyncedInstance>) -> usize {
        let now = SystemTime::now();
        let mut merged = 0;

        for synced in services {
            match synced.into_instance(now) {
                Ok(instance) => {
                    self.store.put(instance);
                    merged += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping invalid synced service");
                }
            }
        }

        merged
    }
}
