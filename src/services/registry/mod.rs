//! Registry service module
//!
//! This module contains the service registry implementation split into logical components:
//! - `types`: Data structures and request/response models
//! - `store`: Concurrent instance store keyed by service id
//! - `round_robin`: Per-service-name rotating selector
//! - `service`: Register / heartbeat / unregister / discover logic
//! - `cleanup`: Heartbeat expiry sweeper
//! - `http_impl`: HTTP handlers and routes

pub mod cleanup;
pub mod error;
pub mod http_impl;
pub mod round_robin;
pub mod service;
pub mod store;
pub mod types;

// Re-export public types for easier access
pub use error::RegistryError;
pub use http_impl::{RegistryState, routes};
pub use round_robin::RoundRobinSelector;
pub use service::{RegistrySettings, ServiceRegistry};
pub use store::ServiceStore;
pub use types::*;
