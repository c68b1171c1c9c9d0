use std::sync::Arc;

use async_trait::async_trait;
use grantvault_storage::{
    GrantStore, GrantStoreFactory, SessionCounter, SharedClock, StoreResult, SystemClock,
};
use papaya::HashMap as PapayaHashMap;

use crate::storage::{GrantMap, InMemoryGrantStore};

/// Hands out handles onto one shared in-memory grant map.
///
/// Cloning the factory shares the map, the clock and the session counter.
#[derive(Debug, Clone)]
pub struct InMemoryStoreFactory {
    data: Arc<GrantMap>,
    clock: SharedClock,
    sessions: SessionCounter,
}

impl InMemoryStoreFactory {
    /// Creates a factory over an empty map using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a factory over an empty map using `clock` for expiry.
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            clock,
            sessions: SessionCounter::new(),
        }
    }

    /// Number of handles opened and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.sessions.open()
    }

    /// Number of grants currently held, across all partitions.
    pub fn grant_count(&self) -> usize {
        self.data.len()
    }

    /// Opens a concrete handle without boxing it.
    pub fn open_store(&self) -> InMemoryGrantStore {
        InMemoryGrantStore::from_parts(
            Arc::clone(&self.data),
            Arc::clone(&self.clock),
            self.sessions.lease(),
        )
    }
}

impl Default for InMemoryStoreFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GrantStoreFactory for InMemoryStoreFactory {
    async fn open(&self) -> StoreResult<Box<dyn GrantStore>> {
        Ok(Box::new(self.open_store()))
    }
}
