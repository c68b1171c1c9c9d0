//! Grant types for the storage abstraction layer.
//!
//! This module defines the transfer shape exchanged with every backend and
//! the partition scoping used by queries.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::StoreResult;
use crate::error::StoreError;

/// Well-known grant type tags.
///
/// The `type` field of a [`Grant`] is a free string; these are the tags an
/// identity server issues in practice.
pub struct GrantType;

impl GrantType {
    pub const AUTHORIZATION_CODE: &'static str = "authorization_code";
    pub const REFERENCE_TOKEN: &'static str = "reference_token";
    pub const REFRESH_TOKEN: &'static str = "refresh_token";
    pub const USER_CONSENT: &'static str = "user_consent";
    pub const DEVICE_CODE: &'static str = "device_code";
}

/// A persisted grant: refresh token, authorization code, consent record, ...
///
/// The store treats `data` as opaque and never inspects it. `subject_id` is
/// the partition key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    /// Unique identifier of the grant within its partition. Immutable.
    pub key: String,

    /// Type tag (see [`GrantType`]). Informational only.
    #[serde(rename = "type")]
    pub grant_type: String,

    /// End-user the grant belongs to; used as the partition key.
    pub subject_id: String,

    /// Application the grant was issued to.
    pub client_id: String,

    /// When the grant was created.
    #[serde(with = "time::serde::rfc3339")]
    pub creation_time: OffsetDateTime,

    /// When the grant expires (None = never expires).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub expiration: Option<OffsetDateTime>,

    /// Protocol-specific serialized payload.
    pub data: String,
}

impl Grant {
    /// Creates a grant that never expires, stamped with the current time.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        grant_type: impl Into<String>,
        subject_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            grant_type: grant_type.into(),
            subject_id: subject_id.into(),
            client_id: client_id.into(),
            creation_time: OffsetDateTime::now_utc(),
            expiration: None,
            data: String::new(),
        }
    }

    /// Sets the expiration instant.
    #[must_use]
    pub fn with_expiration(mut self, expiration: OffsetDateTime) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Sets the creation instant.
    #[must_use]
    pub fn with_creation_time(mut self, creation_time: OffsetDateTime) -> Self {
        self.creation_time = creation_time;
        self
    }

    /// Sets the opaque payload.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    /// The partition this grant is stored in.
    #[must_use]
    pub fn partition_key(&self) -> &str {
        &self.subject_id
    }

    /// Returns `true` if the grant has an expiration strictly before `now`.
    ///
    /// Grants without an expiration never expire.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expiration.is_some_and(|exp| exp < now)
    }

    /// Checks that the grant can be written.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` if the key is empty.
    pub fn validate(&self) -> StoreResult<()> {
        if self.key.trim().is_empty() {
            return Err(StoreError::invalid_argument("grant key must not be empty"));
        }
        Ok(())
    }
}

/// Which partitions a query addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartitionScope {
    /// Every partition. Only for administrative and cleanup scans.
    All,
    /// A single partition (subject).
    Partition(String),
}

impl PartitionScope {
    /// Builds a scope from a partition key; an empty key addresses all partitions.
    #[must_use]
    pub fn from_key(key: impl Into<String>) -> Self {
        let key = key.into();
        if key.is_empty() {
            Self::All
        } else {
            Self::Partition(key)
        }
    }

    /// The single partition addressed, if any.
    #[must_use]
    pub fn partition(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Partition(p) => Some(p),
        }
    }

    /// Returns `true` if `partition` falls inside this scope.
    #[must_use]
    pub fn contains(&self, partition: &str) -> bool {
        match self {
            Self::All => true,
            Self::Partition(p) => p == partition,
        }
    }
}

impl From<&str> for PartitionScope {
    fn from(key: &str) -> Self {
        Self::from_key(key)
    }
}
