pub mod config;
pub mod error;
pub mod http_client;
pub mod registry_client;

pub use config::*;
pub use error::*;
pub use http_client::HttpClient;
pub use registry_client::{HeartbeatHandle, Registration, RegistryClient};
