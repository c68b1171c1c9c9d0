//! Background removal of expired grants.
//!
//! [`TokenCleanup`] owns one background task that wakes up every interval,
//! opens a fresh store handle, and removes the grants whose expiration has
//! passed. Failures are logged and retried on the next tick; only lifecycle
//! misuse is reported to the caller.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use grantvault_cleanup::{CleanupConfig, TokenCleanup};
//! use grantvault_db_memory::InMemoryStoreFactory;
//!
//! let cleanup = TokenCleanup::from_config(
//!     Arc::new(InMemoryStoreFactory::new()),
//!     &CleanupConfig::every(3600),
//! )?;
//! cleanup.start()?;
//! // ...
//! cleanup.shutdown().await?;
//! ```

pub mod config;
pub mod error;
pub mod sweeper;

pub use config::CleanupConfig;
pub use error::{CleanupError, Result};
pub use sweeper::{CleanupState, CleanupStats, TokenCleanup};
