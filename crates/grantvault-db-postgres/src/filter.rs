//! Translation of grant filters to SQL predicates.

use grantvault_storage::GrantFilter;
use sqlx_core::query_builder::QueryBuilder;
use sqlx_postgres::Postgres;

/// Appends the predicate for `filter` to a `... WHERE ` prefix.
pub(crate) fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &GrantFilter) {
    match filter {
        GrantFilter::Key { key } => {
            qb.push("key = ").push_bind(key.clone());
        }
        GrantFilter::Subject { subject_id } => {
            qb.push("partition_key = ").push_bind(subject_id.clone());
        }
        GrantFilter::SubjectClient {
            subject_id,
            client_id,
        } => {
            qb.push("partition_key = ")
                .push_bind(subject_id.clone())
                .push(" AND client_id = ")
                .push_bind(client_id.clone());
        }
        GrantFilter::SubjectClientType {
            subject_id,
            client_id,
            grant_type,
        } => {
            qb.push("partition_key = ")
                .push_bind(subject_id.clone())
                .push(" AND client_id = ")
                .push_bind(client_id.clone())
                .push(" AND grant_type = ")
                .push_bind(grant_type.clone());
        }
        GrantFilter::ExpiredBefore { instant } => {
            qb.push("expiration IS NOT NULL AND expiration < ")
                .push_bind(*instant);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantvault_storage::GrantType;
    use time::macros::datetime;

    fn sql_for(filter: &GrantFilter) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM persisted_grants WHERE ");
        push_filter(&mut qb, filter);
        qb.sql().to_string()
    }

    #[test]
    fn test_key_filter_crosses_partitions() {
        assert_eq!(
            sql_for(&GrantFilter::by_key("rt-1")),
            "DELETE FROM persisted_grants WHERE key = $1"
        );
    }

    #[test]
    fn test_subject_filters() {
        assert_eq!(
            sql_for(&GrantFilter::by_subject("alice")),
            "DELETE FROM persisted_grants WHERE partition_key = $1"
        );
        assert_eq!(
            sql_for(&GrantFilter::by_subject_client("alice", "web")),
            "DELETE FROM persisted_grants WHERE partition_key = $1 AND client_id = $2"
        );
        assert_eq!(
            sql_for(&GrantFilter::by_subject_client_type(
                "alice",
                "web",
                GrantType::REFRESH_TOKEN
            )),
            "DELETE FROM persisted_grants WHERE partition_key = $1 AND client_id = $2 AND grant_type = $3"
        );
    }

    #[test]
    fn test_expired_before_excludes_null_expiration() {
        assert_eq!(
            sql_for(&GrantFilter::expired_before(datetime!(2024-01-01 00:00 UTC))),
            "DELETE FROM persisted_grants WHERE expiration IS NOT NULL AND expiration < $1"
        );
    }
}
