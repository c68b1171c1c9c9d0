pub mod bootstrap;
pub mod config;
pub mod observability;

pub use bootstrap::{GrantVault, build_factory};
pub use config::{AppConfig, StorageBackend};
pub use observability::{apply_logging_level, init_tracing};
