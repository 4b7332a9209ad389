//! In-memory service registry with heartbeat expiry, round-robin discovery
//! and best-effort replication between registry peers.

pub mod config;
pub mod server;
pub mod services;
