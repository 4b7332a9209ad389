pub mod client;
pub mod registry;
pub mod sync;

pub use registry::{RegistryError, RegistrySettings, ServiceInstance, ServiceRegistry};
