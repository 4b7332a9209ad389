use dashmap::DashMap;
use std::sync::Arc;

use super::types::ServiceInstance;

/// 服务实例存储（service_id -> 实例）
///
/// 内部由 `DashMap` 分片加锁，调用方无需额外同步。`list_all` 返回的是弱一致快照，
/// 遍历期间并发增删的实例可能出现也可能不出现。
#[derive(Debug, Clone, Default)]
pub struct ServiceStore {
    services: Arc<DashMap<String, ServiceInstance>>,
}

impl ServiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或覆盖实例，返回被覆盖的旧记录
    pub fn put(&self, instance: ServiceInstance) -> Option<ServiceInstance> {
        self.services.insert(instance.service_id.clone(), instance)
    }

    pub fn get(&self, service_id: &str) -> Option<ServiceInstance> {
        self.services
            .get(service_id)
            .map(|entry| entry.value().clone())
    }

    pub fn delete(&self, service_id: &str) -> Option<ServiceInstance> {
        self.services.remove(service_id).map(|(_, instance)| instance)
    }

    /// 仅当谓词成立时删除，判断与删除在同一分片锁内完成
    pub fn delete_if<F>(&self, service_id: &str, predicate: F) -> Option<ServiceInstance>
    where
        F: FnOnce(&ServiceInstance) -> bool,
    {
        self.services
            .remove_if(service_id, |_, instance| predicate(instance))
            .map(|(_, instance)| instance)
    }

    /// 在持有条目写锁的情况下修改实例
    pub fn update<F, R>(&self, service_id: &str, update_fn: F) -> Option<R>
    where
        F: FnOnce(&mut ServiceInstance) -> R,
    {
        self.services
            .get_mut(service_id)
            .map(|mut entry| update_fn(entry.value_mut()))
    }

    pub fn list_all(&self) -> Vec<ServiceInstance> {
        self.services
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
