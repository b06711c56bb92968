//! Infrastructure layer: tenant stores, broker transport, config, workers.

pub mod config;
pub mod queue;
pub mod registry;
pub mod store;
pub mod workers;

pub use config::AppConfig;
pub use registry::{RegistryError, StoreConnector, TenantRegistry};
pub use store::{StoreError, TenantHandle, TenantStore};
