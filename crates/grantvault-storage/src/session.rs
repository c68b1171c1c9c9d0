//! Open-handle accounting for store factories.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

/// Counts the store handles a factory has handed out and not yet dropped.
///
/// Clones share the same count.
#[derive(Debug, Clone, Default)]
pub struct SessionCounter {
    open: Arc<AtomicUsize>,
}

impl SessionCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one more open handle. The returned lease releases it on drop.
    #[must_use]
    pub fn lease(&self) -> SessionLease {
        let open = self.open.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(open_sessions = open, "Store session opened");
        SessionLease {
            open: Arc::clone(&self.open),
        }
    }

    /// Number of leases currently alive.
    #[must_use]
    pub fn open(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }
}

/// Marks one open store handle. Released when dropped.
#[derive(Debug)]
pub struct SessionLease {
    open: Arc<AtomicUsize>,
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        let open = self.open.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        trace!(open_sessions = open, "Store session released");
    }
}
