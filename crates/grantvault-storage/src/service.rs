//! Persisted grant operations as the identity server calls them.
//!
//! The token-issuance flow does not care about partitions or filter shapes;
//! it stores a grant, looks one up by key, lists a subject's grants and
//! revokes grants per subject and client. This module maps those calls onto
//! the [`GrantStore`] contract.

use std::sync::Arc;

use tracing::debug;

use crate::{StoreError, StoreResult};
use crate::filter::GrantFilter;
use crate::traits::GrantStore;
use crate::types::Grant;

/// Host-facing grant operations layered on a [`GrantStore`].
#[derive(Clone)]
pub struct PersistedGrantService {
    store: Arc<dyn GrantStore>,
}

impl PersistedGrantService {
    #[must_use]
    pub fn new(store: Arc<dyn GrantStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn GrantStore> {
        &self.store
    }

    /// Inserts the grant, or replaces it if its key already exists in the
    /// subject's partition.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for an empty key and propagates
    /// backend failures.
    pub async fn save(&self, grant: &Grant) -> StoreResult<()> {
        match self.store.add(grant).await {
            Err(e) if e.is_conflict() => {
                debug!(grant.key = %grant.key, "Grant exists, replacing");
                match self.store.update(grant).await {
                    // Removed between the insert attempt and the replace.
                    Err(e) if e.is_not_found() => self.store.add(grant).await,
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Looks a grant up by key across all partitions.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Ambiguous` if the key exists in more than one
    /// partition.
    pub async fn get(&self, key: &str) -> StoreResult<Option<Grant>> {
        let filter = GrantFilter::by_key(key);
        let mut found = self.store.find(&filter).await?;
        if found.len() > 1 {
            return Err(StoreError::ambiguous(&filter, found.len()));
        }
        Ok(found.pop())
    }

    /// Every grant of a subject.
    pub async fn get_all(&self, subject_id: &str) -> StoreResult<Vec<Grant>> {
        self.store.find(&GrantFilter::by_subject(subject_id)).await
    }

    /// Removes the grant with this key, wherever it lives. Missing keys are ignored.
    pub async fn remove(&self, key: &str) -> StoreResult<()> {
        let removed = self.store.remove_where(&GrantFilter::by_key(key)).await?;
        debug!(grant.key = %key, removed, "Grant removed");
        Ok(())
    }

    /// Removes every grant a subject gave to a client.
    pub async fn remove_all(&self, subject_id: &str, client_id: &str) -> StoreResult<u64> {
        self.store
            .remove_where(&GrantFilter::by_subject_client(subject_id, client_id))
            .await
    }

    /// Removes every grant of one type a subject gave to a client.
    pub async fn remove_all_of_type(
        &self,
        subject_id: &str,
        client_id: &str,
        grant_type: &str,
    ) -> StoreResult<u64> {
        self.store
            .remove_where(&GrantFilter::by_subject_client_type(
                subject_id, client_id, grant_type,
            ))
            .await
    }
}
