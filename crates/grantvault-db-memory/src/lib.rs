//! In-memory grant storage backend for grantvault.
//!
//! This crate provides an in-memory implementation of the `GrantStore` trait
//! from `grantvault-storage`, using papaya lock-free HashMap for concurrent access.
//! Grants are keyed by (partition, key), so writes to different grants never
//! contend on a lock.
//!
//! # Example
//!
//! ```ignore
//! use grantvault_db_memory::InMemoryStoreFactory;
//! use grantvault_storage::{Grant, GrantStore, GrantStoreFactory, GrantType};
//!
//! let factory = InMemoryStoreFactory::new();
//! let store = factory.open().await?;
//! store
//!     .add(&Grant::new("rt-1", GrantType::REFRESH_TOKEN, "alice", "web-app"))
//!     .await?;
//! ```

pub mod factory;
pub mod storage;

// Re-export the store traits for convenience
pub use grantvault_storage::{GrantStore, GrantStoreFactory, StoreError};

pub use factory::InMemoryStoreFactory;
pub use storage::{InMemoryGrantStore, StorageKey};
