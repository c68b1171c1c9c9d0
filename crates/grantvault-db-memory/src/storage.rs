use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use grantvault_storage::{
    Grant, GrantFilter, GrantStore, PartitionScope, SessionLease, SharedClock, StoreError,
    StoreResult, SystemClock, ensure_same_identity, resolve_unique,
};
use papaya::HashMap as PapayaHashMap;
use tracing::debug;

/// Address of a grant: partition (subject) plus key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub partition: String,
    pub key: String,
}

impl StorageKey {
    pub fn new(partition: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            key: key.into(),
        }
    }

    pub(crate) fn of(grant: &Grant) -> Self {
        Self::new(grant.partition_key(), grant.key.clone())
    }
}

pub(crate) type GrantMap = PapayaHashMap<StorageKey, Grant>;

/// In-memory grant store using papaya lock-free HashMap.
///
/// This store provides:
/// - Lock-free concurrent access via papaya::HashMap
/// - Atomic per-record insert, replace and delete
/// - Best-effort filtered replace/delete and bulk expiry
///
/// Handles opened through [`InMemoryStoreFactory`](crate::InMemoryStoreFactory)
/// share one map and hold a session lease until dropped.
pub struct InMemoryGrantStore {
    data: Arc<GrantMap>,
    clock: SharedClock,
    _lease: Option<SessionLease>,
}

impl std::fmt::Debug for InMemoryGrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGrantStore")
            .field("grants", &self.data.len())
            .field("clock", &self.clock)
            .finish()
    }
}

impl InMemoryGrantStore {
    /// Creates a standalone store with its own map and the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a standalone store with its own map and the given clock.
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            clock,
            _lease: None,
        }
    }

    pub(crate) fn from_parts(data: Arc<GrantMap>, clock: SharedClock, lease: SessionLease) -> Self {
        Self {
            data,
            clock,
            _lease: Some(lease),
        }
    }

    /// Reads one grant by partition and key.
    pub fn get(&self, partition: &str, key: &str) -> Option<Grant> {
        let guard = self.data.pin();
        guard.get(&StorageKey::new(partition, key)).cloned()
    }

    /// Number of stored grants across all partitions.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn snapshot(&self, filter: impl Fn(&StorageKey, &Grant) -> bool) -> Vec<Grant> {
        let guard = self.data.pin();
        guard
            .iter()
            .filter(|&(k, g)| filter(k, g))
            .map(|(_, g)| g.clone())
            .collect()
    }

    fn matching(&self, filter: &GrantFilter) -> Vec<Grant> {
        let scope = filter.scope();
        self.snapshot(|k, g| scope.contains(&k.partition) && filter.matches(g))
    }
}

impl Default for InMemoryGrantStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    fn query(&self, scope: PartitionScope) -> BoxStream<'_, StoreResult<Grant>> {
        let grants = self.snapshot(|k, _| scope.contains(&k.partition));
        stream::iter(grants.into_iter().map(Ok)).boxed()
    }

    async fn find(&self, filter: &GrantFilter) -> StoreResult<Vec<Grant>> {
        Ok(self.matching(filter))
    }

    async fn count(&self, filter: &GrantFilter) -> StoreResult<u64> {
        let scope = filter.scope();
        let guard = self.data.pin();
        let count = guard
            .iter()
            .filter(|&(k, g)| scope.contains(&k.partition) && filter.matches(g))
            .count();
        Ok(count as u64)
    }

    async fn add(&self, grant: &Grant) -> StoreResult<()> {
        grant.validate()?;
        let guard = self.data.pin();

        match guard.try_insert(StorageKey::of(grant), grant.clone()) {
            Ok(_) => Ok(()),
            Err(_) => Err(StoreError::conflict(grant.partition_key(), &grant.key)),
        }
    }

    async fn update(&self, grant: &Grant) -> StoreResult<()> {
        grant.validate()?;
        let guard = self.data.pin();

        guard
            .update(StorageKey::of(grant), |_| grant.clone())
            .map(|_| ())
            .ok_or_else(|| {
                StoreError::not_found(format!("{}/{}", grant.partition_key(), grant.key))
            })
    }

    async fn remove(&self, grant: &Grant) -> StoreResult<()> {
        let guard = self.data.pin();
        guard.remove(&StorageKey::of(grant));
        Ok(())
    }

    async fn update_where(&self, filter: &GrantFilter, grant: &Grant) -> StoreResult<()> {
        grant.validate()?;
        let matched = self.matching(filter);
        let target = resolve_unique(filter, &matched)?;
        ensure_same_identity(target, grant)?;

        // The target may have been removed since it was matched.
        self.update(grant).await
    }

    async fn remove_where(&self, filter: &GrantFilter) -> StoreResult<u64> {
        let keys: Vec<StorageKey> = self
            .matching(filter)
            .iter()
            .map(StorageKey::of)
            .collect();

        let guard = self.data.pin();
        let mut removed = 0u64;
        for key in &keys {
            // Skip grants that no longer match, e.g. renewed since the scan.
            if let Ok(Some(_)) = guard.remove_if(key, |_, g| filter.matches(g)) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn remove_expired(&self) -> StoreResult<u64> {
        let now = self.clock.now();
        let removed = self
            .remove_where(&GrantFilter::expired_before(now))
            .await?;
        debug!(removed, %now, "Removed expired grants");
        Ok(removed)
    }
}
