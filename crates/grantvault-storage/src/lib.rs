//! # grantvault-storage
//!
//! Storage abstraction layer for persisted grants.
//!
//! This crate defines the contract that every grant backend implements. It
//! does not contain any backend - those are provided by separate crates.
//!
//! ## Overview
//!
//! The main trait is [`GrantStore`], which defines:
//! - Partition-scoped queries returning a lazy stream of grants
//! - Single-record insert, replace and delete (atomic per record)
//! - Filtered replace and delete over a closed set of [`GrantFilter`] shapes
//! - Bulk expiry of grants whose expiration has passed
//!
//! Handles are acquired through a [`GrantStoreFactory`]; dropping a handle
//! releases the underlying session.
//!
//! ## Example
//!
//! ```ignore
//! use grantvault_storage::{Grant, GrantFilter, GrantStore, StoreError};
//!
//! async fn consents_of(
//!     store: &dyn GrantStore,
//!     subject_id: &str,
//! ) -> Result<Vec<Grant>, StoreError> {
//!     let grants = store.find(&GrantFilter::by_subject(subject_id)).await?;
//!     Ok(grants
//!         .into_iter()
//!         .filter(|g| g.grant_type == grantvault_storage::GrantType::USER_CONSENT)
//!         .collect())
//! }
//! ```
//!
//! ## Storage Backends
//!
//! To implement a backend, implement [`GrantStore`] and [`GrantStoreFactory`]:
//!
//! ```ignore
//! use async_trait::async_trait;
//! use grantvault_storage::{Grant, GrantStore, StoreResult};
//!
//! struct MyStore {
//!     // ...
//! }
//!
//! #[async_trait]
//! impl GrantStore for MyStore {
//!     async fn add(&self, grant: &Grant) -> StoreResult<()> {
//!         // Implementation
//!     }
//!     // ... other methods
//! }
//! ```

mod clock;
mod error;
mod filter;
pub mod service;
mod session;
mod traits;
mod types;

// Re-export everything from submodules
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{ErrorCategory, StoreError};
pub use filter::{GrantFilter, ensure_same_identity, resolve_unique};
pub use service::PersistedGrantService;
pub use session::{SessionCounter, SessionLease};
pub use traits::{GrantStore, GrantStoreFactory};
pub use types::{Grant, GrantType, PartitionScope};

/// Type alias for a store result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for a shareable store factory.
pub type DynGrantStoreFactory = std::sync::Arc<dyn GrantStoreFactory>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use grantvault_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SharedClock, SystemClock};
    pub use crate::error::{ErrorCategory, StoreError};
    pub use crate::filter::GrantFilter;
    pub use crate::service::PersistedGrantService;
    pub use crate::traits::{GrantStore, GrantStoreFactory};
    pub use crate::types::{Grant, GrantType, PartitionScope};
    pub use crate::{DynGrantStoreFactory, StoreResult};
}
