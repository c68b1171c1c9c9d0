//! Named filter shapes for filtered reads, updates and deletes.
//!
//! Backends evaluate these in process ([`GrantFilter::matches`]) or translate
//! them to their native query syntax.

use std::fmt;

use time::OffsetDateTime;

use crate::StoreResult;
use crate::error::StoreError;
use crate::types::{Grant, PartitionScope};

/// A predicate over stored grant fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantFilter {
    /// The grant with this key, in whichever partition it lives.
    Key { key: String },
    /// Every grant of a subject.
    Subject { subject_id: String },
    /// Every grant a subject gave to a client.
    SubjectClient {
        subject_id: String,
        client_id: String,
    },
    /// Every grant of one type a subject gave to a client.
    SubjectClientType {
        subject_id: String,
        client_id: String,
        grant_type: String,
    },
    /// Grants whose expiration is set and strictly before `instant`.
    ExpiredBefore { instant: OffsetDateTime },
}

impl GrantFilter {
    #[must_use]
    pub fn by_key(key: impl Into<String>) -> Self {
        Self::Key { key: key.into() }
    }

    #[must_use]
    pub fn by_subject(subject_id: impl Into<String>) -> Self {
        Self::Subject {
            subject_id: subject_id.into(),
        }
    }

    #[must_use]
    pub fn by_subject_client(subject_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self::SubjectClient {
            subject_id: subject_id.into(),
            client_id: client_id.into(),
        }
    }

    #[must_use]
    pub fn by_subject_client_type(
        subject_id: impl Into<String>,
        client_id: impl Into<String>,
        grant_type: impl Into<String>,
    ) -> Self {
        Self::SubjectClientType {
            subject_id: subject_id.into(),
            client_id: client_id.into(),
            grant_type: grant_type.into(),
        }
    }

    #[must_use]
    pub fn expired_before(instant: OffsetDateTime) -> Self {
        Self::ExpiredBefore { instant }
    }

    /// The partition this filter is confined to, if any.
    #[must_use]
    pub fn partition(&self) -> Option<&str> {
        match self {
            Self::Subject { subject_id }
            | Self::SubjectClient { subject_id, .. }
            | Self::SubjectClientType { subject_id, .. } => Some(subject_id),
            Self::Key { .. } | Self::ExpiredBefore { .. } => None,
        }
    }

    /// The partition scope a backend has to scan to evaluate this filter.
    #[must_use]
    pub fn scope(&self) -> PartitionScope {
        match self.partition() {
            Some(p) => PartitionScope::Partition(p.to_string()),
            None => PartitionScope::All,
        }
    }

    /// Returns `true` if `grant` satisfies this filter.
    #[must_use]
    pub fn matches(&self, grant: &Grant) -> bool {
        match self {
            Self::Key { key } => grant.key == *key,
            Self::Subject { subject_id } => grant.subject_id == *subject_id,
            Self::SubjectClient {
                subject_id,
                client_id,
            } => grant.subject_id == *subject_id && grant.client_id == *client_id,
            Self::SubjectClientType {
                subject_id,
                client_id,
                grant_type,
            } => {
                grant.subject_id == *subject_id
                    && grant.client_id == *client_id
                    && grant.grant_type == *grant_type
            }
            Self::ExpiredBefore { instant } => grant.is_expired_at(*instant),
        }
    }
}

impl fmt::Display for GrantFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key { key } => write!(f, "key={key}"),
            Self::Subject { subject_id } => write!(f, "subject={subject_id}"),
            Self::SubjectClient {
                subject_id,
                client_id,
            } => write!(f, "subject={subject_id},client={client_id}"),
            Self::SubjectClientType {
                subject_id,
                client_id,
                grant_type,
            } => write!(
                f,
                "subject={subject_id},client={client_id},type={grant_type}"
            ),
            Self::ExpiredBefore { instant } => write!(f, "expired_before={instant}"),
        }
    }
}

/// Picks the single grant a filtered update may touch.
///
/// # Errors
///
/// Returns `StoreError::NotFound` when nothing matched and
/// `StoreError::Ambiguous` when more than one grant matched.
pub fn resolve_unique<'a>(filter: &GrantFilter, matched: &'a [Grant]) -> StoreResult<&'a Grant> {
    match matched {
        [] => Err(StoreError::not_found(filter.to_string())),
        [only] => Ok(only),
        many => Err(StoreError::ambiguous(filter, many.len())),
    }
}

/// Checks that `replacement` keeps the identity (key and partition) of `existing`.
///
/// # Errors
///
/// Returns `StoreError::InvalidArgument` if the key or subject differ.
pub fn ensure_same_identity(existing: &Grant, replacement: &Grant) -> StoreResult<()> {
    if existing.key != replacement.key {
        return Err(StoreError::invalid_argument(format!(
            "grant key is immutable: matched '{}', replacement carries '{}'",
            existing.key, replacement.key
        )));
    }
    if existing.subject_id != replacement.subject_id {
        return Err(StoreError::invalid_argument(format!(
            "grant '{}' cannot move from partition '{}' to '{}'",
            existing.key, existing.subject_id, replacement.subject_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GrantType;
    use time::Duration;
    use time::macros::datetime;

    fn grant(key: &str, subject: &str, client: &str, grant_type: &str) -> Grant {
        Grant::new(key, grant_type, subject, client)
    }

    #[test]
    fn test_matches_named_shapes() {
        let g = grant("k1", "alice", "app", GrantType::REFRESH_TOKEN);

        assert!(GrantFilter::by_key("k1").matches(&g));
        assert!(!GrantFilter::by_key("k2").matches(&g));
        assert!(GrantFilter::by_subject("alice").matches(&g));
        assert!(GrantFilter::by_subject_client("alice", "app").matches(&g));
        assert!(!GrantFilter::by_subject_client("alice", "other").matches(&g));
        assert!(
            GrantFilter::by_subject_client_type("alice", "app", GrantType::REFRESH_TOKEN)
                .matches(&g)
        );
        assert!(
            !GrantFilter::by_subject_client_type("alice", "app", GrantType::USER_CONSENT)
                .matches(&g)
        );
    }

    #[test]
    fn test_expired_before_skips_grants_without_expiration() {
        let now = datetime!(2024-03-01 00:00 UTC);
        let filter = GrantFilter::expired_before(now);

        let never = grant("k1", "alice", "app", GrantType::REFRESH_TOKEN);
        let past = never.clone().with_expiration(now - Duration::seconds(1));
        let future = never.clone().with_expiration(now + Duration::seconds(1));

        assert!(!filter.matches(&never));
        assert!(filter.matches(&past));
        assert!(!filter.matches(&future));
    }

    #[test]
    fn test_partition_hint() {
        assert_eq!(GrantFilter::by_subject("alice").partition(), Some("alice"));
        assert_eq!(GrantFilter::by_key("k").partition(), None);
        assert_eq!(GrantFilter::by_key("k").scope(), PartitionScope::All);
        assert_eq!(
            GrantFilter::by_subject_client("bob", "app").scope(),
            PartitionScope::Partition("bob".to_string())
        );
    }

    #[test]
    fn test_resolve_unique() {
        let filter = GrantFilter::by_subject("alice");
        let a = grant("k1", "alice", "app", GrantType::REFRESH_TOKEN);
        let b = grant("k2", "alice", "app", GrantType::REFRESH_TOKEN);

        assert!(resolve_unique(&filter, &[]).unwrap_err().is_not_found());
        assert_eq!(resolve_unique(&filter, std::slice::from_ref(&a)).unwrap().key, "k1");
        assert!(resolve_unique(&filter, &[a, b]).unwrap_err().is_ambiguous());
    }

    #[test]
    fn test_ensure_same_identity() {
        let existing = grant("k1", "alice", "app", GrantType::REFRESH_TOKEN);
        let same = existing.clone().with_data("new payload");
        let rekeyed = grant("k2", "alice", "app", GrantType::REFRESH_TOKEN);
        let moved = grant("k1", "bob", "app", GrantType::REFRESH_TOKEN);

        assert!(ensure_same_identity(&existing, &same).is_ok());
        assert!(ensure_same_identity(&existing, &rekeyed).unwrap_err().is_invalid_argument());
        assert!(ensure_same_identity(&existing, &moved).unwrap_err().is_invalid_argument());
    }
}
