use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::Config;
use crate::services::client::HttpClient;
use crate::services::registry::{RegistryState, ServiceRegistry, routes};
use crate::services::sync::PeerSync;

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

pub async fn start(config: Config) -> Result<(), ServerError> {
    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutting down registry service...");
        signal_token.cancel();
    });

    serve(listener, config, shutdown).await
}

/// 在给定监听器上运行注册中心，直到 `shutdown` 被取消
pub async fn serve(
    listener: TcpListener,
    config: Config,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let task_tracker = TaskTracker::new();

    // 初始化服务注册表
    let registry = Arc::new(ServiceRegistry::new(config.registry_settings()));
    let http_client = HttpClient::new(config.http_client_config())?;
    let peer_sync = PeerSync::new(config.sync_settings(), http_client, task_tracker.clone());

    // 启动后台任务
    registry.start_cleanup_task(&task_tracker, shutdown.clone());
    if peer_sync.is_enabled() {
        tracing::info!(peers = ?peer_sync.peers(), "Peer synchronization enabled");
        peer_sync.start_full_sync_task(registry.clone(), shutdown.clone());
    } else {
        tracing::info!("No peers configured, running standalone");
    }

    let app = routes(RegistryState::new(registry, peer_sync));
    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        heartbeat_ttl_secs = config.registry.heartbeat_ttl_seconds,
        cleanup_period_secs = config.registry.cleanup_period_seconds,
        "Registry service listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await;

    // 停止清理与同步任务，等待在途的推送结束
    shutdown.cancel();
    task_tracker.close();
    task_tracker.wait().await;
    tracing::info!("Registry service stopped gracefully");

    result.map_err(Into::into)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
