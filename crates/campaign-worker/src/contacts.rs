//! Contact list source (SPEC_FULL.md supplemental feature). The durable
//! contact list itself — upload, validation, storage — is out of scope;
//! this is the read-only seam the Campaign Worker uses to pull rows by
//! index from whatever populated `contact_list_rows`.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::WorkerError;

#[derive(Debug, Clone)]
pub struct ContactRow {
    pub row_index: i64,
    pub data: Value,
}

impl ContactRow {
    /// The destination number a contact row carries. Tried under a few
    /// common key names since the upload pipeline that populates this
    /// table is outside this core.
    pub fn to_number(&self) -> Option<&str> {
        for key in ["phone", "to_number", "to"] {
            if let Some(v) = self.data.get(key).and_then(Value::as_str) {
                return Some(v);
            }
        }
        None
    }

    pub fn provider_override(&self) -> Option<core_models::Provider> {
        self.data.get("provider").and_then(Value::as_str).and_then(core_models::Provider::from_str)
    }

    pub fn context_flags(&self) -> core_models::ContextFlags {
        core_models::ContextFlags {
            include_global_context: self.data.get("includeGlobalContext").and_then(Value::as_bool).unwrap_or(false),
            include_agent_context: self.data.get("includeAgentContext").and_then(Value::as_bool).unwrap_or(false),
        }
    }
}

#[async_trait]
pub trait ContactListSource: Send + Sync {
    /// Rows from `list_id` with `row_index >= start_index`, ordered by
    /// `row_index`, up to `limit` rows.
    async fn load_slice(&self, list_id: Uuid, start_index: i64, limit: i64) -> Result<Vec<ContactRow>, WorkerError>;
}

pub struct PostgresContactListSource {
    pool: PgPool,
}

impl PostgresContactListSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactListSource for PostgresContactListSource {
    async fn load_slice(&self, list_id: Uuid, start_index: i64, limit: i64) -> Result<Vec<ContactRow>, WorkerError> {
        let rows: Vec<(i64, Value)> = sqlx::query_as(
            r#"
            SELECT row_index, data
            FROM contact_list_rows
            WHERE list_id = $1 AND row_index >= $2
            ORDER BY row_index
            LIMIT $3
            "#,
        )
        .bind(list_id)
        .bind(start_index)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(row_index, data)| ContactRow { row_index, data }).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_number_tries_known_keys_in_order() {
        let row = ContactRow {
            row_index: 0,
            data: serde_json::json!({"to_number": "+15551234567"}),
        };
        assert_eq!(row.to_number(), Some("+15551234567"));
    }

    #[test]
    fn missing_to_number_is_none() {
        let row = ContactRow { row_index: 0, data: serde_json::json!({"firstName": "Ada"}) };
        assert_eq!(row.to_number(), None);
    }
}
