use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use super::error::RegistryError;
use super::service::ServiceRegistry;
use super::types::{
    DiscoveryListResponse, DiscoveryQuery, DiscoveryResponse, HeartbeatRequest,
    HeartbeatResponse, RegisterServiceRequest, RegisterServiceResponse,
};
use crate::services::sync::{
    FULL_SYNC_PATH, PeerSync, SYNC_PATH, SyncAction, SyncBatch, SyncMessage, SyncResponse,
};

/// 请求处理器共享状态
#[derive(Debug, Clone)]
pub struct RegistryState {
    pub registry: Arc<ServiceRegistry>,
    pub peer_sync: PeerSync,
}

impl RegistryState {
    pub fn new(registry: Arc<ServiceRegistry>, peer_sync: PeerSync) -> Self {
        Self { registry, peer_sync }
    }
}

/// 注册中心 HTTP 路由
pub fn routes(state: RegistryState) -> Router {
    Router::new()
        .route("/api/register", post(register_handler))
        .route("/api/unregister", post(unregister_handler))
        .route("/api/heartbeat", post(heartbeat_handler))
        .route("/api/discovery", get(discovery_handler))
        .route(SYNC_PATH, post(sync_handler))
        .route(FULL_SYNC_PATH, post(full_sync_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn register_handler(
    State(state): State<RegistryState>,
    payload: Result<Json<RegisterServiceRequest>, JsonRejection>,
) -> Result<Json<RegisterServiceResponse>, RegistryError> {
    let Json(request) = payload?;
    let service = state.registry.register(request)?;
    state.peer_sync.push_mutation(&service, SyncAction::Register);

    Ok(Json(RegisterServiceResponse {
        message: "Service registered successfully".into(),
        service,
    }))
}

async fn unregister_handler(
    State(state): State<RegistryState>,
    payload: Result<Json<RegisterServiceRequest>, JsonRejection>,
) -> Result<Json<RegisterServiceResponse>, RegistryError> {
    let Json(request) = payload?;
    let service = state.registry.unregister(request)?;
    state.peer_sync.push_mutation(&service, SyncAction::Unregister);

    Ok(Json(RegisterServiceResponse {
        message: "Service unregistered successfully".into(),
        service,
    }))
}

async fn heartbeat_handler(
    State(state): State<RegistryState>,
    payload: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> Result<Json<HeartbeatResponse>, RegistryError> {
    let Json(request) = payload?;
    let service_id = state.registry.heartbeat(&request)?;

    Ok(Json(HeartbeatResponse {
        message: "Heartbeat received".into(),
        service_id,
    }))
}

// 未指定 name 时返回全部实例且不做健康过滤，与按名查询的行为刻意保持不同
async fn discovery_handler(
    State(state): State<RegistryState>,
    query: Result<Query<DiscoveryQuery>, QueryRejection>,
) -> Result<Response, RegistryError> {
    let Query(query) = query?;

    match query.name.filter(|name| !name.is_empty()) {
        None => Ok(Json(DiscoveryListResponse {
            services: state.registry.all_services(),
        })
        .into_response()),
        Some(name) => {
            let service = state.registry.discover(&name)?;
            Ok(Json(DiscoveryResponse::from(service)).into_response())
        }
    }
}

async fn sync_handler(
    State(state): State<RegistryState>,
    payload: Result<Json<SyncMessage>, JsonRejection>,
) -> Result<Json<SyncResponse>, RegistryError> {
    let Json(message) = payload?;
    let action = state.registry.apply_sync(message)?;

    Ok(Json(SyncResponse::ok(format!("Sync {action} applied"))))
}

async fn full_sync_handler(
    State(state): State<RegistryState>,
    payload: Result<Json<SyncBatch>, JsonRejection>,
) -> Result<Json<SyncResponse>, RegistryError> {
    let Json(batch) = payload?;
    let received = batch.services.len();
    let merged = state.registry.merge_services(batch.services);
    tracing::debug!(received, merged, "Merged full sync from peer");

    Ok(Json(SyncResponse::ok(format!("Merged {merged} of {received} services"))))
}
