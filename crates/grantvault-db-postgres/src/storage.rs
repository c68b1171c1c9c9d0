//! PostgreSQL implementation of the grant store.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use grantvault_storage::{
    Grant, GrantFilter, GrantStore, PartitionScope, SessionLease, SharedClock, StoreError,
    StoreResult, ensure_same_identity, resolve_unique,
};
use sqlx_core::query::query;
use sqlx_core::query_builder::QueryBuilder;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::{PgPool, Postgres};
use tracing::{debug, instrument};

use crate::document::GrantDocument;
use crate::error::{is_unique_violation, store_error};
use crate::filter::push_filter;

const SELECT_ALL: &str = "SELECT document FROM persisted_grants ORDER BY partition_key, key";

const SELECT_PARTITION: &str =
    "SELECT document FROM persisted_grants WHERE partition_key = $1 ORDER BY key";

const INSERT: &str = r#"
    INSERT INTO persisted_grants
        (partition_key, key, grant_type, client_id, creation_time, expiration, document)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

const UPDATE: &str = r#"
    UPDATE persisted_grants
    SET grant_type = $3, client_id = $4, creation_time = $5, expiration = $6, document = $7
    WHERE partition_key = $1 AND key = $2
"#;

const DELETE: &str = "DELETE FROM persisted_grants WHERE partition_key = $1 AND key = $2";

/// Grant store handle over a PostgreSQL pool.
///
/// Every statement checks a connection out of the pool and returns it when
/// the statement completes. The handle itself only holds a session lease.
pub struct PostgresGrantStore {
    pool: PgPool,
    clock: SharedClock,
    _lease: SessionLease,
}

impl std::fmt::Debug for PostgresGrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresGrantStore")
            .field("pool_size", &self.pool.size())
            .field("clock", &self.clock)
            .finish()
    }
}

impl PostgresGrantStore {
    pub(crate) fn new(pool: PgPool, clock: SharedClock, lease: SessionLease) -> Self {
        Self {
            pool,
            clock,
            _lease: lease,
        }
    }
}

fn decode(value: serde_json::Value) -> StoreResult<Grant> {
    Ok(GrantDocument::from_json(value)?.into())
}

/// Column values of one row, in statement parameter order.
struct Row {
    partition_key: String,
    key: String,
    grant_type: String,
    client_id: String,
    creation_time: time::OffsetDateTime,
    expiration: Option<time::OffsetDateTime>,
    document: serde_json::Value,
}

impl Row {
    fn from_grant(grant: &Grant) -> StoreResult<Self> {
        grant.validate()?;
        Ok(Self {
            partition_key: grant.partition_key().to_string(),
            key: grant.key.clone(),
            grant_type: grant.grant_type.clone(),
            client_id: grant.client_id.clone(),
            creation_time: grant.creation_time,
            expiration: grant.expiration,
            document: GrantDocument::from(grant).to_json()?,
        })
    }

    fn bind(
        self,
        sql: &'static str,
    ) -> sqlx_core::query::Query<'static, Postgres, sqlx_postgres::PgArguments> {
        query(sql)
            .bind(self.partition_key)
            .bind(self.key)
            .bind(self.grant_type)
            .bind(self.client_id)
            .bind(self.creation_time)
            .bind(self.expiration)
            .bind(self.document)
    }
}

#[async_trait]
impl GrantStore for PostgresGrantStore {
    fn query(&self, scope: PartitionScope) -> BoxStream<'_, StoreResult<Grant>> {
        let rows = match scope {
            PartitionScope::All => {
                query_scalar::<Postgres, serde_json::Value>(SELECT_ALL).fetch(&self.pool)
            }
            PartitionScope::Partition(partition) => {
                query_scalar::<Postgres, serde_json::Value>(SELECT_PARTITION)
                    .bind(partition)
                    .fetch(&self.pool)
            }
        };

        rows.map(|row| row.map_err(store_error).and_then(decode))
            .boxed()
    }

    async fn find(&self, filter: &GrantFilter) -> StoreResult<Vec<Grant>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT document FROM persisted_grants WHERE ");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY partition_key, key");

        let rows: Vec<serde_json::Value> = qb
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        rows.into_iter().map(decode).collect()
    }

    async fn count(&self, filter: &GrantFilter) -> StoreResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM persisted_grants WHERE ");
        push_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    #[instrument(skip_all, fields(partition = %grant.subject_id, grant.key = %grant.key))]
    async fn add(&self, grant: &Grant) -> StoreResult<()> {
        let row = Row::from_grant(grant)?;

        row.bind(INSERT)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::conflict(grant.partition_key(), &grant.key)
                } else {
                    store_error(e)
                }
            })?;

        Ok(())
    }

    #[instrument(skip_all, fields(partition = %grant.subject_id, grant.key = %grant.key))]
    async fn update(&self, grant: &Grant) -> StoreResult<()> {
        let row = Row::from_grant(grant)?;

        let result = row
            .bind(UPDATE)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!(
                "{}/{}",
                grant.partition_key(),
                grant.key
            )));
        }
        Ok(())
    }

    async fn remove(&self, grant: &Grant) -> StoreResult<()> {
        query(DELETE)
            .bind(grant.partition_key())
            .bind(grant.key.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(())
    }

    #[instrument(skip_all, fields(filter = %filter, grant.key = %grant.key))]
    async fn update_where(&self, filter: &GrantFilter, grant: &Grant) -> StoreResult<()> {
        let row = Row::from_grant(grant)?;
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT document FROM persisted_grants WHERE ");
        push_filter(&mut qb, filter);
        qb.push(" FOR UPDATE");

        let rows: Vec<serde_json::Value> = qb
            .build_query_scalar()
            .fetch_all(&mut *tx)
            .await
            .map_err(store_error)?;
        let matched = rows
            .into_iter()
            .map(decode)
            .collect::<StoreResult<Vec<_>>>()?;

        // Dropping `tx` on any early return rolls back and releases the row locks.
        let target = resolve_unique(filter, &matched)?;
        ensure_same_identity(target, grant)?;

        row.bind(UPDATE)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        tx.commit().await.map_err(store_error)?;

        Ok(())
    }

    async fn remove_where(&self, filter: &GrantFilter) -> StoreResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM persisted_grants WHERE ");
        push_filter(&mut qb, filter);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(result.rows_affected())
    }

    async fn remove_expired(&self) -> StoreResult<u64> {
        let now = self.clock.now();
        let removed = self
            .remove_where(&GrantFilter::expired_before(now))
            .await?;
        debug!(removed, %now, "Removed expired grants");
        Ok(removed)
    }
}
