use registry_center::config::Config;
use registry_center::server;
use tracing_subscriber::EnvFilter;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("registry_center=info,tower_http=info")),
        )
        .init();

    let config = Config::load()?;
    tracing::info!(addr = %config.listen_addr(), "Starting registry service...");
    server::start(config).await?;
    Ok(())
}
