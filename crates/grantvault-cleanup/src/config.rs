//! Sweeper configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CleanupError, Result};

/// Token cleanup options.
///
/// There is no default interval: an enabled sweeper must be given one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Whether the host starts the sweeper at all.
    pub enabled: bool,

    /// Seconds between sweeps. Required, and strictly positive.
    pub interval_secs: Option<i64>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: None,
        }
    }
}

impl CleanupConfig {
    /// Enabled sweeper running every `secs` seconds.
    #[must_use]
    pub fn every(secs: i64) -> Self {
        Self {
            enabled: true,
            interval_secs: Some(secs),
        }
    }

    /// The sweep interval as a duration.
    ///
    /// # Errors
    ///
    /// Returns `CleanupError::InvalidArgument` if `interval_secs` is missing,
    /// zero or negative.
    pub fn interval(&self) -> Result<Duration> {
        let Some(secs) = self.interval_secs else {
            return Err(CleanupError::invalid_argument("interval_secs is required"));
        };
        match u64::try_from(secs) {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(CleanupError::invalid_argument(format!(
                "interval_secs must be greater than 0, got {secs}"
            ))),
        }
    }
}
