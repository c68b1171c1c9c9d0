//! Store factory over a shared PostgreSQL pool.

use std::sync::Arc;

use async_trait::async_trait;
use grantvault_storage::{
    GrantStore, GrantStoreFactory, SessionCounter, SharedClock, StoreResult, SystemClock,
};
use sqlx_postgres::PgPool;
use tracing::{info, instrument};

use crate::config::PostgresConfig;
use crate::error::Result;
use crate::migrations;
use crate::pool::{create_pool, mask_password};
use crate::storage::PostgresGrantStore;

/// Hands out [`PostgresGrantStore`] handles sharing one connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStoreFactory {
    pool: PgPool,
    clock: SharedClock,
    sessions: SessionCounter,
}

impl PostgresStoreFactory {
    /// Connects to the database and applies migrations if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or a migration fails.
    #[instrument(skip(config), fields(url = %mask_password(&config.url)))]
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = create_pool(config).await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        info!("PostgreSQL grant store ready");
        Ok(Self::new(pool))
    }

    /// Wraps an existing pool. Migrations are the caller's concern.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    /// Wraps an existing pool, using `clock` for expiry.
    #[must_use]
    pub fn with_clock(pool: PgPool, clock: SharedClock) -> Self {
        Self {
            pool,
            clock,
            sessions: SessionCounter::new(),
        }
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Number of handles opened and not yet dropped.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.sessions.open()
    }

    /// Opens a concrete handle without boxing it.
    #[must_use]
    pub fn open_store(&self) -> PostgresGrantStore {
        PostgresGrantStore::new(
            self.pool.clone(),
            Arc::clone(&self.clock),
            self.sessions.lease(),
        )
    }
}

#[async_trait]
impl GrantStoreFactory for PostgresStoreFactory {
    async fn open(&self) -> StoreResult<Box<dyn GrantStore>> {
        Ok(Box::new(self.open_store()))
    }
}
