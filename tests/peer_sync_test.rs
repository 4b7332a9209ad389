use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use registry_center::config::Config;
use registry_center::server::{self, ServerError};
use registry_center::services::client::{ClientError, HttpClient, HttpClientConfig, RegistryClient};

struct Node {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl Node {
    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    async fn stop(self) {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("node did not shut down")
            .expect("node task panicked")
            .expect("node returned error");
    }
}

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    (listener, addr)
}

fn node_config(peers: Vec<String>) -> Config {
    let mut config = Config::default();
    config.sync.peers = peers;
    config.sync.interval_seconds = 1;
    config.http_client.timeout_ms = 1000;
    config.http_client.max_retries = 1;
    config.http_client.retry_delay_ms = 50;
    config
}

fn spawn_node(listener: TcpListener, addr: SocketAddr, config: Config) -> Node {
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(server::serve(listener, config, shutdown.clone()));
    Node { addr, shutdown, handle }
}

fn client_for(node: &Node) -> RegistryClient {
    let http = HttpClient::new(HttpClientConfig {
        timeout: Duration::from_secs(1),
        max_retries: 0,
        retry_delay: Duration::from_millis(10),
    })
    .unwrap();
    RegistryClient::new(vec![node.url()], http).unwrap()
}

async fn wait_for_discovery(client: &RegistryClient, service_name: &str) -> Option<String> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Ok(found) = client.discover(service_name).await {
            return Some(found.service_id);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    None
}

#[tokio::test]
async fn test_registration_replicates_to_peer() {
    let (listener1, addr1) = bind().await;
    let (listener2, addr2) = bind().await;

    // 单向且只走变更推送：全量同步快照可能晚于注销推送到达并复活记录
    let mut push_only = node_config(vec![format!("http://{addr2}")]);
    push_only.sync.interval_seconds = 3600;
    let node1 = spawn_node(listener1, addr1, push_only);
    let node2 = spawn_node(listener2, addr2, node_config(Vec::new()));

    let registration = client_for(&node1)
        .register("time-service", "10.0.0.1", 8280)
        .await
        .expect("register on node 1");

    let on_node2 = client_for(&node2);
    let found = wait_for_discovery(&on_node2, "time-service").await;
    assert_eq!(found.as_deref(), Some(registration.service_id.as_str()));

    // 注销同样会传播到对端
    client_for(&node1).unregister(&registration).await;
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let services = on_node2.discover_all().await.expect("list node 2");
        if services.is_empty() {
            break;
        }
        assert!(Instant::now() < deadline, "unregister was not replicated");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    node1.stop().await;
    node2.stop().await;
}

#[tokio::test]
async fn test_heartbeat_loop_keeps_instance_alive() {
    let (listener, addr) = bind().await;
    let mut config = node_config(Vec::new());
    config.registry.heartbeat_ttl_seconds = 1;
    config.registry.cleanup_period_seconds = 1;
    let node = spawn_node(listener, addr, config);

    let client = client_for(&node);
    let registration = client
        .register("time-service", "10.0.0.4", 8283)
        .await
        .expect("register");
    assert_eq!(client.heartbeat(&registration).await, 1);

    let heartbeat = client.start_heartbeat(registration.clone(), Duration::from_millis(300));
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let found = client.discover("time-service").await.expect("kept alive by heartbeats");
    assert_eq!(found.service_id, registration.service_id);

    heartbeat.stop().await;
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let services = client.discover_all().await.expect("list services");
        if services.is_empty() {
            break;
        }
        assert!(Instant::now() < deadline, "instance did not expire after heartbeats stopped");
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert!(client.discover("time-service").await.is_err());

    node.stop().await;
}

#[tokio::test]
async fn test_discover_encodes_service_name() {
    let (listener, addr) = bind().await;
    let node = spawn_node(listener, addr, node_config(Vec::new()));
    let client = client_for(&node);

    client.register("a", "10.0.0.6", 8284).await.expect("register a");
    let special = client.register("a&b", "10.0.0.7", 8285).await.expect("register a&b");
    let hashed = client.register("c#d+e%", "10.0.0.8", 8286).await.expect("register c#d+e%");

    let found = client.discover("a&b").await.expect("discover a&b");
    assert_eq!(found.service_id, special.service_id);
    assert_eq!(found.service_name, "a&b");

    let found = client.discover("c#d+e%").await.expect("discover c#d+e%");
    assert_eq!(found.service_id, hashed.service_id);

    node.stop().await;
}

#[tokio::test]
async fn test_bidirectional_peers_converge() {
    let (listener1, addr1) = bind().await;
    let (listener2, addr2) = bind().await;

    let node1 = spawn_node(listener1, addr1, node_config(vec![format!("http://{addr2}")]));
    let node2 = spawn_node(listener2, addr2, node_config(vec![format!("http://{addr1}")]));

    let on_node1 = client_for(&node1);
    let on_node2 = client_for(&node2);
    let first = on_node1.register("time-service", "10.0.0.1", 8280).await.unwrap();
    let second = on_node2.register("client-service", "10.0.0.5", 8380).await.unwrap();

    assert_eq!(
        wait_for_discovery(&on_node1, "client-service").await.as_deref(),
        Some(second.service_id.as_str())
    );
    assert_eq!(
        wait_for_discovery(&on_node2, "time-service").await.as_deref(),
        Some(first.service_id.as_str())
    );
    assert_eq!(on_node1.discover_all().await.unwrap().len(), 2);
    assert_eq!(on_node2.discover_all().await.unwrap().len(), 2);

    node1.stop().await;
    node2.stop().await;
}

#[tokio::test]
async fn test_full_sync_reaches_late_peer() {
    let (listener1, addr1) = bind().await;
    let (listener2, addr2) = bind().await;
    // node 2 尚未启动，推送失败只记录日志
    drop(listener2);

    let node1 = spawn_node(listener1, addr1, node_config(vec![format!("http://{addr2}")]));
    let registration = client_for(&node1)
        .register("time-service", "10.0.0.2", 8281)
        .await
        .expect("register on node 1");

    tokio::time::sleep(Duration::from_millis(300)).await;
    let listener2 = TcpListener::bind(addr2).await.expect("rebind node 2");
    let node2 = spawn_node(listener2, addr2, node_config(Vec::new()));

    let found = wait_for_discovery(&client_for(&node2), "time-service").await;
    assert_eq!(found.as_deref(), Some(registration.service_id.as_str()));

    node1.stop().await;
    node2.stop().await;
}

#[tokio::test]
async fn test_registration_survives_unreachable_peers() {
    let (listener, addr) = bind().await;
    let (dead_listener, dead_addr) = bind().await;
    drop(dead_listener);

    let node = spawn_node(listener, addr, node_config(vec![format!("http://{dead_addr}")]));
    let client = client_for(&node);

    let registration = client
        .register("time-service", "10.0.0.3", 8282)
        .await
        .expect("local register must not depend on peers");
    let found = client.discover("time-service").await.expect("discover locally");
    assert_eq!(found.service_id, registration.service_id);

    let err = client.discover("unknown-service").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(matches!(err, ClientError::RetriesExhausted { .. }));

    node.stop().await;
}
