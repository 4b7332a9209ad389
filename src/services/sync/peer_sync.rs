use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::types::{SyncAction, SyncBatch, SyncMessage, SyncResponse, SyncedInstance};
use crate::services::client::{ClientError, HttpClient};
use crate::services::registry::{ServiceInstance, ServiceRegistry};

pub const SYNC_PATH: &str = "/api/internal/sync";
pub const FULL_SYNC_PATH: &str = "/api/internal/sync/full";

/// 对端同步配置
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// 其他注册中心的地址列表
    pub peers: Vec<String>,
    /// 全量同步间隔
    pub interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            interval: Duration::from_secs(30),
        }
    }
}

/// 尽力而为的对端复制：变更推送 + 周期全量推送，失败只记录日志
#[derive(Debug, Clone)]
pub struct PeerSync {
    peers: Arc<Vec<String>>,
    interval: Duration,
    client: HttpClient,
    task_tracker: TaskTracker,
}

impl PeerSync {
    pub fn new(settings: SyncSettings, client: HttpClient, task_tracker: TaskTracker) -> Self {
        let peers = settings
            .peers
            .into_iter()
            .map(|peer| peer.trim().trim_end_matches('/').to_string())
            .filter(|peer| !peer.is_empty())
            .collect();

        Self {
            peers: Arc::new(peers),
            interval: settings.interval,
            client,
            task_tracker,
        }
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn is_enabled(&self) -> bool {
        !self.peers.is_empty()
    }

    /// 本地注册/注销成功后调用；每个对端一个后台任务，不阻塞原请求
    pub fn push_mutation(&self, instance: &ServiceInstance, action: SyncAction) {
        if self.peers.is_empty() {
            return;
        }

        let message = Arc::new(SyncMessage::new(SyncedInstance::from(instance), action));
        for peer in self.peers.iter() {
            let url = format!("{peer}{SYNC_PATH}");
            let client = self.client.clone();
            let message = Arc::clone(&message);

            self.task_tracker.spawn(async move {
                match client.post::<_, SyncResponse>(&url, message.as_ref()).await {
                    Ok(_) => {
                        tracing::debug!(
                            peer = %url,
                            service_id = %message.service.service_id,
                            action = %message.action,
                            "Pushed mutation to peer"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            peer = %url,
                            service_id = %message.service.service_id,
                            action = %message.action,
                            error = %e,
                            "Failed to push mutation to peer"
                        );
                    }
                }
            });
        }
    }

    // 启动周期全量同步任务
    pub fn start_full_sync_task(&self, registry: Arc<ServiceRegistry>, shutdown: CancellationToken) {
        if self.peers.is_empty() {
            tracing::warn!("No peers configured for synchronization");
            return;
        }

        let peer_sync = self.clone();
        self.task_tracker.spawn(async move {
            let mut interval = tokio::time::interval(peer_sync.interval);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Full sync task stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        peer_sync.sync_with_peers(&registry).await;
                    }
                }
            }
        });
    }

    /// 把本地全部实例推送给每个对端，返回成功的对端数量
    pub async fn sync_with_peers(&self, registry: &ServiceRegistry) -> usize {
        let batch = SyncBatch {
            services: registry
                .all_services()
                .iter()
                .map(SyncedInstance::from)
                .collect(),
        };

        let results = join_all(self.peers.iter().map(|peer| self.push_batch(peer, &batch))).await;

        let mut synced = 0;
        for (peer, result) in self.peers.iter().zip(results) {
            match result {
                Ok(response) => {
                    tracing::info!(
                        peer = %peer,
                        services = batch.services.len(),
                        message = %response.message,
                        "Successfully synced with peer"
                    );
                    synced += 1;
                }
                Err(e) => {
                    tracing::warn!(peer = %peer, error = %e, "Failed to sync with peer");
                }
            }
        }
        synced
    }

    async fn push_batch(&self, peer: &str, batch: &SyncBatch) -> Result<SyncResponse, ClientError> {
        let url = format!("{peer}{FULL_SYNC_PATH}");
        self.client.post(&url, batch).await
    }
}
