//! Connection pool shared by every grant store handle.

use std::str::FromStr;
use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgConnectOptions, PgPool, Postgres};
use tracing::{debug, info, instrument};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};

/// Validates `config` and opens the pool.
///
/// The pool starts empty and connects lazily up to `pool_size`; idle
/// connections are not tested on checkout, a failing statement surfaces as a
/// transient store error instead.
#[instrument(skip(config), fields(url = %mask_password(&config.url)))]
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    config.validate()?;

    let connect_options = PgConnectOptions::from_str(config.url.trim())
        .map_err(|e| PostgresError::config(format!("url cannot be parsed: {e}")))?
        .application_name(&config.application_name);

    info!(
        pool_size = config.pool_size,
        connect_timeout_ms = config.connect_timeout_ms,
        application_name = %config.application_name,
        "Creating grant store connection pool"
    );

    let mut options = PoolOptions::<Postgres>::new()
        .max_connections(config.pool_size)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .test_before_acquire(false);

    if let Some(idle_timeout) = config.idle_timeout_ms {
        options = options.idle_timeout(Duration::from_millis(idle_timeout));
    }

    let pool = options.connect_with(connect_options).await?;
    debug!("Grant store connection pool ready");

    Ok(pool)
}

/// Replaces the password of a connection URL with `****`.
pub(crate) fn mask_password(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:****@{host}"),
        None => url.to_string(),
    }
}
