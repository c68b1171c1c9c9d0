//! The expired-grant sweeper.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use grantvault_storage::{DynGrantStoreFactory, StoreResult};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::CleanupConfig;
use crate::error::{CleanupError, Result};

/// Lifecycle state of a [`TokenCleanup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupState {
    Stopped,
    Running,
}

impl fmt::Display for CleanupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Counters accumulated over the sweeper's lifetime, across restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Interval ticks that elapsed without cancellation.
    pub ticks: u64,
    /// Ticks whose sweep completed without error.
    pub sweeps: u64,
    /// Grants removed in total.
    pub removed: u64,
    /// Ticks whose sweep failed.
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    sweeps: AtomicU64,
    removed: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CleanupStats {
        CleanupStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the handle and the background task.
struct Inner {
    factory: DynGrantStoreFactory,
    interval: Duration,
    counters: Counters,
}

impl Inner {
    /// One sweep: open a handle and let the store remove what its clock
    /// considers expired.
    ///
    /// The handle is dropped when this returns, before the next wait.
    async fn sweep(&self) -> StoreResult<u64> {
        let store = self.factory.open().await?;

        let removed = store.remove_expired().await?;
        trace!(removed, "Expired grant sweep finished");
        if removed > 0 {
            info!(removed, "Removed expired grants");
        }
        Ok(removed)
    }

    async fn run(
        self: Arc<Self>,
        previous: Option<JoinHandle<()>>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        // A loop stopped just before this start may still be finishing a sweep.
        if let Some(previous) = previous
            && let Err(e) = previous.await
        {
            warn!(error = %e, "Previous token cleanup task ended abnormally");
        }

        debug!(
            interval_secs = self.interval.as_secs(),
            "Token cleanup started"
        );

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    // A dropped sender also means nobody can stop us any more.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("Token cleanup cancelled");
                        break;
                    }
                }
                () = tokio::time::sleep(self.interval) => {
                    self.counters.ticks.fetch_add(1, Ordering::Relaxed);

                    match self.sweep().await {
                        Ok(removed) => {
                            self.counters.sweeps.fetch_add(1, Ordering::Relaxed);
                            self.counters.removed.fetch_add(removed, Ordering::Relaxed);
                        }
                        Err(e) => {
                            self.counters.failures.fetch_add(1, Ordering::Relaxed);
                            error!(
                                error = %e,
                                category = %e.category(),
                                "Failed to remove expired grants"
                            );
                        }
                    }
                }
            }
        }

        debug!("Token cleanup stopped");
    }
}

struct Running {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    running: Option<Running>,
    /// Task of a loop that was stopped but not awaited.
    stopping: Option<JoinHandle<()>>,
}

/// Periodically removes expired grants in the background.
///
/// `Stopped -> Running -> Stopped`, any number of times. [`start`](Self::start)
/// spawns the loop on the current tokio runtime and returns immediately;
/// [`stop`](Self::stop) cancels the interval wait. A sweep already in flight
/// when `stop` is called runs to completion; a loop started after that waits
/// for it to finish before its own first interval, so sweeps never overlap.
pub struct TokenCleanup {
    inner: Arc<Inner>,
    slot: Mutex<Slot>,
}

impl fmt::Debug for TokenCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCleanup")
            .field("interval", &self.inner.interval)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

impl TokenCleanup {
    /// Creates a stopped sweeper.
    ///
    /// # Errors
    ///
    /// Returns `CleanupError::InvalidArgument` if `interval` is zero.
    pub fn new(factory: DynGrantStoreFactory, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(CleanupError::invalid_argument(
                "interval must be greater than 0",
            ));
        }

        Ok(Self {
            inner: Arc::new(Inner {
                factory,
                interval,
                counters: Counters::default(),
            }),
            slot: Mutex::new(Slot::default()),
        })
    }

    /// Creates a stopped sweeper from configuration.
    ///
    /// # Errors
    ///
    /// Returns `CleanupError::InvalidArgument` if the configured interval is
    /// not strictly positive.
    pub fn from_config(factory: DynGrantStoreFactory, config: &CleanupConfig) -> Result<Self> {
        Self::new(factory, config.interval()?)
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn state(&self) -> CleanupState {
        if self.lock().running.is_some() {
            CleanupState::Running
        } else {
            CleanupState::Stopped
        }
    }

    pub fn stats(&self) -> CleanupStats {
        self.inner.counters.snapshot()
    }

    /// Starts the background loop.
    ///
    /// # Errors
    ///
    /// Returns `CleanupError::InvalidState` if already running or if called
    /// outside a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.lock();
        if slot.running.is_some() {
            return Err(CleanupError::invalid_state(
                "token cleanup is already running, stop it first",
            ));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CleanupError::invalid_state(format!("no tokio runtime: {e}")))?;

        let previous = slot.stopping.take().filter(|h| !h.is_finished());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = runtime.spawn(Arc::clone(&self.inner).run(previous, shutdown_rx));

        slot.running = Some(Running {
            shutdown_tx,
            handle,
        });
        Ok(())
    }

    /// Signals the loop to stop and returns without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns `CleanupError::InvalidState` if not running.
    pub fn stop(&self) -> Result<()> {
        let handle = self.take_running()?;
        self.lock().stopping = Some(handle);
        Ok(())
    }

    /// Signals the loop to stop and waits until its task has exited.
    ///
    /// # Errors
    ///
    /// Returns `CleanupError::InvalidState` if not running.
    pub async fn shutdown(&self) -> Result<()> {
        let handle = self.take_running()?;
        if let Err(e) = handle.await {
            error!(error = %e, "Token cleanup task ended abnormally");
        }
        Ok(())
    }

    fn take_running(&self) -> Result<JoinHandle<()>> {
        let Some(running) = self.lock().running.take() else {
            return Err(CleanupError::invalid_state("token cleanup is not running"));
        };

        // The receiver is gone only if the task already exited.
        let _ = running.shutdown_tx.send(true);
        debug!("Token cleanup stop requested");
        Ok(running.handle)
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TokenCleanup {
    fn drop(&mut self) {
        if let Some(running) = self.lock().running.take() {
            let _ = running.shutdown_tx.send(true);
        }
    }
}
