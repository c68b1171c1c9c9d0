//! Stored document shape of a grant.
//!
//! The `document` JSONB column holds this shape. It carries the grant's key
//! as `id` and its partition as `partitionKey` so a row can be read back
//! without consulting the other columns.

use grantvault_storage::Grant;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A grant as persisted in the `document` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantDocument {
    /// The grant key.
    pub id: String,
    /// The subject the grant belongs to.
    pub partition_key: String,
    #[serde(rename = "type")]
    pub grant_type: String,
    pub subject_id: String,
    pub client_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub creation_time: OffsetDateTime,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub expiration: Option<OffsetDateTime>,
    #[serde(default)]
    pub data: String,
}

impl From<&Grant> for GrantDocument {
    fn from(grant: &Grant) -> Self {
        Self {
            id: grant.key.clone(),
            partition_key: grant.partition_key().to_string(),
            grant_type: grant.grant_type.clone(),
            subject_id: grant.subject_id.clone(),
            client_id: grant.client_id.clone(),
            creation_time: grant.creation_time,
            expiration: grant.expiration,
            data: grant.data.clone(),
        }
    }
}

impl From<GrantDocument> for Grant {
    fn from(doc: GrantDocument) -> Self {
        Grant {
            key: doc.id,
            grant_type: doc.grant_type,
            subject_id: doc.subject_id,
            client_id: doc.client_id,
            creation_time: doc.creation_time,
            expiration: doc.expiration,
            data: doc.data,
        }
    }
}

impl GrantDocument {
    /// Decodes a `document` column value.
    pub fn from_json(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Encodes the document for the `document` column.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantvault_storage::GrantType;
    use time::macros::datetime;

    #[test]
    fn test_document_carries_id_and_partition() {
        let grant = Grant::new("code-42", GrantType::AUTHORIZATION_CODE, "alice", "spa")
            .with_creation_time(datetime!(2024-02-10 08:30 UTC))
            .with_expiration(datetime!(2024-02-10 08:35 UTC))
            .with_data("{\"nonce\":\"n-1\"}");

        let json = GrantDocument::from(&grant).to_json().unwrap();
        assert_eq!(json["id"], "code-42");
        assert_eq!(json["partitionKey"], "alice");
        assert_eq!(json["type"], "authorization_code");
        assert_eq!(json["clientId"], "spa");
        assert_eq!(json["expiration"], "2024-02-10T08:35:00Z");

        let back: Grant = GrantDocument::from_json(json).unwrap().into();
        assert_eq!(back, grant);
    }

    #[test]
    fn test_document_without_expiration() {
        let json = serde_json::json!({
            "id": "consent-1",
            "partitionKey": "bob",
            "type": "user_consent",
            "subjectId": "bob",
            "clientId": "web",
            "creationTime": "2024-01-01T00:00:00Z",
            "data": ""
        });

        let grant: Grant = GrantDocument::from_json(json).unwrap().into();
        assert_eq!(grant.key, "consent-1");
        assert!(grant.expiration.is_none());
    }
}
