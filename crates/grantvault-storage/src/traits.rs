//! Store traits for the grant storage abstraction layer.
//!
//! This module defines the contract every grant backend implements.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::StoreResult;
use crate::filter::GrantFilter;
use crate::types::{Grant, PartitionScope};

/// Persisted grant storage.
///
/// Single-record operations (`add`, `update`, `remove`) are atomic: a caller
/// never observes a partially written grant. Bulk operations (`update_where`,
/// `remove_where`, `remove_expired`) are best effort: a backend may read the
/// matching keys first and then act on each, so a grant modified between the
/// read and the write can be skipped.
///
/// # Example
///
/// ```ignore
/// use grantvault_storage::{Grant, GrantStore, StoreError};
///
/// async fn rotate(store: &dyn GrantStore, old: &Grant, new: &Grant) -> Result<(), StoreError> {
///     store.add(new).await?;
///     store.remove(old).await
/// }
/// ```
#[async_trait]
pub trait GrantStore: Send + Sync {
    // ==================== Reads ====================

    /// Streams every grant in `scope`.
    ///
    /// [`PartitionScope::All`] crosses partitions and is meant for
    /// administrative scans. The stream is finite and not restartable; grants
    /// written while it is consumed may or may not appear.
    fn query(&self, scope: PartitionScope) -> BoxStream<'_, StoreResult<Grant>>;

    /// Returns every grant matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error only for backend failures, not for an empty result.
    async fn find(&self, filter: &GrantFilter) -> StoreResult<Vec<Grant>>;

    /// Counts the grants matching `filter`.
    async fn count(&self, filter: &GrantFilter) -> StoreResult<u64>;

    // ==================== Single-record writes ====================

    /// Inserts a new grant into the partition of its subject.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` if the key is empty.
    /// Returns `StoreError::Conflict` if the key already exists in the partition;
    /// the stored grant is left unchanged.
    async fn add(&self, grant: &Grant) -> StoreResult<()>;

    /// Replaces the grant with the same key in the partition of its subject.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such grant exists.
    async fn update(&self, grant: &Grant) -> StoreResult<()>;

    /// Deletes the grant with the same key in the partition of its subject.
    ///
    /// Deleting a grant that does not exist succeeds.
    async fn remove(&self, grant: &Grant) -> StoreResult<()>;

    // ==================== Filtered writes ====================

    /// Replaces the single grant matching `filter` with `grant`.
    ///
    /// The replacement must keep the key and subject of the matched grant.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if nothing matches and
    /// `StoreError::Ambiguous` if more than one grant matches; nothing is
    /// written in either case.
    async fn update_where(&self, filter: &GrantFilter, grant: &Grant) -> StoreResult<()>;

    /// Deletes every grant matching `filter` and returns how many were removed.
    ///
    /// Zero matches is a success.
    async fn remove_where(&self, filter: &GrantFilter) -> StoreResult<u64>;

    /// Deletes every grant, across all partitions, whose expiration is set
    /// and strictly before "now".
    ///
    /// "Now" is read once from the store's clock at the start of the call.
    /// Grants without an expiration are never touched. Calling this on a
    /// store with nothing expired is a no-op.
    async fn remove_expired(&self) -> StoreResult<u64>;
}

/// Hands out scoped store handles.
///
/// Each call to [`open`](GrantStoreFactory::open) acquires a fresh session;
/// dropping the returned handle releases it on every exit path.
#[async_trait]
pub trait GrantStoreFactory: Send + Sync {
    /// Opens a new store handle.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` if the backend cannot be reached.
    async fn open(&self) -> StoreResult<Box<dyn GrantStore>>;
}
