//! Wiring of the grant store and the sweeper from configuration.

use std::sync::Arc;

use anyhow::Context;
use grantvault_cleanup::TokenCleanup;
use grantvault_db_memory::InMemoryStoreFactory;
use grantvault_storage::{DynGrantStoreFactory, PersistedGrantService, StoreResult};
use tracing::{info, warn};

use crate::config::{AppConfig, StorageBackend, StorageConfig};

/// Builds the store factory for the configured backend.
pub async fn build_factory(config: &StorageConfig) -> anyhow::Result<DynGrantStoreFactory> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory grant store");
            Ok(Arc::new(InMemoryStoreFactory::new()))
        }
        StorageBackend::Postgres => grantvault_db_postgres::create_factory(&config.postgres)
            .await
            .context("failed to initialise the PostgreSQL grant store"),
    }
}

/// A running grant store with its optional sweeper.
pub struct GrantVault {
    factory: DynGrantStoreFactory,
    cleanup: Option<TokenCleanup>,
}

impl GrantVault {
    /// Builds the store and starts the sweeper if enabled.
    pub async fn start(config: &AppConfig) -> anyhow::Result<Self> {
        let factory = build_factory(&config.storage).await?;
        Self::start_with_factory(factory, config)
    }

    /// Starts on an existing factory.
    pub fn start_with_factory(
        factory: DynGrantStoreFactory,
        config: &AppConfig,
    ) -> anyhow::Result<Self> {
        let cleanup = if config.cleanup.enabled {
            let cleanup = TokenCleanup::from_config(Arc::clone(&factory), &config.cleanup)
                .context("invalid cleanup configuration")?;
            cleanup.start().context("failed to start token cleanup")?;
            info!(
                interval_secs = cleanup.interval().as_secs(),
                "Token cleanup enabled"
            );
            Some(cleanup)
        } else {
            info!("Token cleanup disabled");
            None
        };

        Ok(Self { factory, cleanup })
    }

    pub fn factory(&self) -> &DynGrantStoreFactory {
        &self.factory
    }

    pub fn cleanup(&self) -> Option<&TokenCleanup> {
        self.cleanup.as_ref()
    }

    /// Opens a store handle and wraps it in the host-facing grant operations.
    pub async fn grants(&self) -> StoreResult<PersistedGrantService> {
        let store = self.factory.open().await?;
        Ok(PersistedGrantService::new(Arc::from(store)))
    }

    /// Stops the sweeper and waits for its task to exit.
    pub async fn shutdown(self) {
        if let Some(cleanup) = self.cleanup {
            if let Err(e) = cleanup.shutdown().await {
                warn!(error = %e, "Token cleanup was not running at shutdown");
            }
            let stats = cleanup.stats();
            info!(
                sweeps = stats.sweeps,
                removed = stats.removed,
                failures = stats.failures,
                "Token cleanup stopped"
            );
        }
    }
}
