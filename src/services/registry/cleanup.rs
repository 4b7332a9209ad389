use std::sync::Arc;
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::service::ServiceRegistry;

impl ServiceRegistry {
    // 启动定期清理任务，收到关闭信号后退出
    pub fn start_cleanup_task(self: &Arc<Self>, tracker: &TaskTracker, shutdown: CancellationToken) {
        let registry = Arc::clone(self);
        let cleanup_period = self.settings.cleanup_period;

        tracker.spawn(async move {
            let mut interval = tokio::time::interval(cleanup_period);
            // 第一次 tick 立即返回，跳过
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Cleanup task stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        tracing::debug!("Executing service expiration check...");
                        registry.cleanup_expired_services();
                    }
                }
            }
        });
    }

    /// 清理心跳超时的服务实例，返回被移除的 service_id
    pub fn cleanup_expired_services(&self) -> Vec<String> {
        self.cleanup_expired_services_at(SystemTime::now())
    }

    pub fn cleanup_expired_services_at(&self, now: SystemTime) -> Vec<String> {
        let timeout = self.settings.heartbeat_ttl;

        // 收集需要删除的服务
        let expired: Vec<String> = self
            .store
            .list_all()
            .into_iter()
            .filter(|instance| !instance.is_alive_at(now, timeout))
            .map(|instance| instance.service_id)
            .collect();

        if !expired.is_empty() {
            tracing::info!(
                expired_count = expired.len(),
                "Cleanup check completed, removing expired services..."
            );
        }

        // 删除前再次检查，期间收到心跳的实例保留
        expired
            .into_iter()
            .filter(|service_id| {
                let removed = self
                    .store
                    .delete_if(service_id, |instance| !instance.is_alive_at(now, timeout));
                if let Some(instance) = &removed {
                    tracing::warn!(
                        service_name = %instance.service_name,
                        service_id = %instance.service_id,
                        elapsed_secs = instance.elapsed_since_heartbeat(now).as_secs(),
                        timeout_secs = timeout.as_secs(),
                        "Service expired due to heartbeat timeout, removed from registry"
                    );
                }
                removed.is_some()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::registry::service::RegistrySettings;
    use crate::services::registry::types::RegisterServiceRequest;
    use std::time::Duration;

    fn registry() -> Arc<ServiceRegistry> {
        Arc::new(ServiceRegistry::new(RegistrySettings {
            heartbeat_ttl: Duration::from_secs(10),
            cleanup_period: Duration::from_millis(20),
        }))
    }

    fn register(registry: &ServiceRegistry, id: &str) {
        registry
            .register(RegisterServiceRequest {
                service_name: "time-service".into(),
                service_id: id.into(),
                ip_address: "10.0.0.1".into(),
                port: 8280,
            })
            .unwrap();
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let registry = registry();
        register(&registry, "A");
        register(&registry, "B");

        let later = SystemTime::now() + Duration::from_secs(11);
        let mut removed = registry.cleanup_expired_services_at(later);
        removed.sort();
        assert_eq!(removed, ["A", "B"]);

        assert!(registry.cleanup_expired_services_at(later).is_empty());
        assert!(registry.all_services().is_empty());
    }

    #[test]
    fn test_sweep_keeps_live_instances() {
        let registry = registry();
        register(&registry, "A");

        assert!(registry.cleanup_expired_services().is_empty());
        assert!(registry.get_service("A").is_some());
    }

    #[test]
    fn test_sweep_only_removes_stale_instances() {
        let registry = registry();
        register(&registry, "A");
        register(&registry, "B");

        // A 的心跳晚 5 秒，在 later 时刻仍然存活
        registry.store.update("A", |s| s.last_heartbeat += Duration::from_secs(5));

        let later = SystemTime::now() + Duration::from_secs(12);
        let removed = registry.cleanup_expired_services_at(later);
        assert_eq!(removed, ["B"]);
        assert!(registry.get_service("A").is_some());
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_on_shutdown() {
        let registry = Arc::new(ServiceRegistry::new(RegistrySettings {
            heartbeat_ttl: Duration::from_millis(30),
            cleanup_period: Duration::from_millis(20),
        }));
        register(&registry, "A");

        let tracker = TaskTracker::new();
        let shutdown = CancellationToken::new();
        registry.start_cleanup_task(&tracker, shutdown.clone());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(registry.get_service("A").is_none());

        shutdown.cancel();
        tracker.close();
        tokio::time::timeout(Duration::from_secs(1), tracker.wait())
            .await
            .expect("cleanup task did not stop");
    }
}
