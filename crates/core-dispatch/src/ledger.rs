//! Active-Call Ledger (§4.1): the authoritative per-call record. Every
//! write targets exactly one row keyed by `call_uuid`; no multi-document
//! transactions are needed (§9 design note).

use chrono::{DateTime, Utc};
use core_models::{ActiveCall, CallStatus, FailureReason, NewActiveCall};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DispatchError;

/// Result of `insert`: distinguishes a fresh row from a duplicate
/// `call_uuid` that was coalesced into success (§4.1, invariant I6).
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted(ActiveCall),
    AlreadyTracked(ActiveCall),
}

impl InsertOutcome {
    pub fn call(&self) -> &ActiveCall {
        match self {
            InsertOutcome::Inserted(c) | InsertOutcome::AlreadyTracked(c) => c,
        }
    }
}

/// Fields written alongside a status transition (§4.1 `transition`).
#[derive(Debug, Default, Clone)]
pub struct TransitionFields {
    pub end_time: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub end_reason: Option<String>,
    pub failure_reason: Option<FailureReason>,
}

pub struct ActiveCallLedger {
    pool: PgPool,
}

impl ActiveCallLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a fresh ledger row. A duplicate `call_uuid` (the pre-insert
    /// caller already wrote the first copy) is coalesced into success and
    /// never treated as an error (§4.1, invariant I6).
    pub async fn insert(&self, call: NewActiveCall) -> Result<InsertOutcome, DispatchError> {
        let context_flags = serde_json::to_value(call.context_flags)
            .map_err(|e| DispatchError::Internal(e.to_string()))?;

        let inserted: Option<ActiveCall> = sqlx::query_as(
            r#"
            INSERT INTO active_calls (
                call_uuid, client_id, campaign_id, from_number, to_number,
                provider, status, status_timestamp, start_time,
                failure_reason, warmup_attempts, warmup_duration_ms,
                contact_index, sequence_number, contact_data, context_flags,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), $8, $9, $10, $11, $12, $13, $14, $15, NOW())
            ON CONFLICT (call_uuid) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&call.call_uuid)
        .bind(call.client_id)
        .bind(call.campaign_id)
        .bind(&call.from_number)
        .bind(&call.to_number)
        .bind(call.provider)
        .bind(call.status)
        .bind(call.start_time)
        .bind(call.failure_reason)
        .bind(call.warmup_attempts)
        .bind(call.warmup_duration_ms)
        .bind(call.contact_index)
        .bind(call.sequence_number)
        .bind(&call.contact_data)
        .bind(&context_flags)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => Ok(InsertOutcome::Inserted(row)),
            None => {
                let existing: ActiveCall =
                    sqlx::query_as("SELECT * FROM active_calls WHERE call_uuid = $1")
                        .bind(&call.call_uuid)
                        .fetch_one(&self.pool)
                        .await?;
                tracing::info!(call_uuid = %call.call_uuid, "duplicate ledger insert coalesced to success");
                Ok(InsertOutcome::AlreadyTracked(existing))
            }
        }
    }

    /// Post-dispatch enrichment once Twilio's API response carries the
    /// real `CallSid` for a pre-reserved row (§4.4 Twilio).
    pub async fn update_after_start(
        &self,
        call_uuid: &str,
        twilio_call_sid: &str,
    ) -> Result<bool, DispatchError> {
        let result = sqlx::query("UPDATE active_calls SET twilio_call_sid = $1 WHERE call_uuid = $2")
            .bind(twilio_call_sid)
            .bind(call_uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Resolve a Twilio `CallSid` back to the `call_uuid` it was
    /// pre-reserved under (§4.7).
    pub async fn find_by_twilio_sid(&self, call_sid: &str) -> Result<Option<ActiveCall>, DispatchError> {
        let row = sqlx::query_as("SELECT * FROM active_calls WHERE twilio_call_sid = $1")
            .bind(call_sid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn find_by_call_uuid(&self, call_uuid: &str) -> Result<Option<ActiveCall>, DispatchError> {
        let row = sqlx::query_as("SELECT * FROM active_calls WHERE call_uuid = $1")
            .bind(call_uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Write a status transition. Terminal states are sticky (P3): a row
    /// already in `call-ended | failed | timeout` is left untouched and
    /// the call still reports success (idempotent webhook replay, §4.7).
    /// Returns whether a matching (non-terminal) row was found.
    pub async fn transition(
        &self,
        call_uuid: &str,
        new_status: CallStatus,
        fields: TransitionFields,
    ) -> Result<bool, DispatchError> {
        let result = sqlx::query(
            r#"
            UPDATE active_calls
            SET status = $2,
                status_timestamp = NOW(),
                end_time = COALESCE($3, end_time),
                duration_secs = COALESCE($4, duration_secs),
                end_reason = COALESCE($5, end_reason),
                failure_reason = COALESCE($6, failure_reason)
            WHERE call_uuid = $1
              AND status NOT IN ('call-ended', 'failed', 'timeout')
            "#,
        )
        .bind(call_uuid)
        .bind(new_status)
        .bind(fields.end_time)
        .bind(fields.duration_secs)
        .bind(fields.end_reason)
        .bind(fields.failure_reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // No row updated — either unknown call_uuid, or already terminal
        // (idempotent no-op success per §4.7).
        let exists = self.find_by_call_uuid(call_uuid).await?.is_some();
        Ok(exists)
    }

    /// Number of rows counting against concurrency (`processed | ringing |
    /// ongoing`, §3 invariant I2), optionally scoped to one client.
    pub async fn count_active(&self, client_id: Option<Uuid>) -> Result<i64, DispatchError> {
        let count: (i64,) = match client_id {
            Some(id) => {
                sqlx::query_as(
                    r#"
                    SELECT COUNT(*) FROM active_calls
                    WHERE client_id = $1 AND status IN ('processed', 'ringing', 'ongoing')
                    "#,
                )
                .bind(id)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"SELECT COUNT(*) FROM active_calls WHERE status IN ('processed', 'ringing', 'ongoing')"#,
                )
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(count.0)
    }

    /// Bulk-expire stuck rows (§4.8). Each status has its own age
    /// threshold; all matching rows move to `failed` with the given
    /// failure reason in one pass. Returns the number of rows expired.
    pub async fn bulk_expire(
        &self,
        now: DateTime<Utc>,
        processed_max_age_secs: i64,
        ringing_max_age_secs: i64,
        ongoing_max_age_secs: i64,
        failure_reason: FailureReason,
    ) -> Result<u64, DispatchError> {
        let result = sqlx::query(
            r#"
            UPDATE active_calls
            SET status = 'failed',
                status_timestamp = $1,
                failure_reason = $5,
                end_time = $1
            WHERE
                (status = 'processed' AND status_timestamp < $1 - make_interval(secs => $2))
                OR (status = 'ringing' AND status_timestamp < $1 - make_interval(secs => $3))
                OR (status = 'ongoing' AND status_timestamp < $1 - make_interval(secs => $4))
            "#,
        )
        .bind(now)
        .bind(processed_max_age_secs as f64)
        .bind(ringing_max_age_secs as f64)
        .bind(ongoing_max_age_secs as f64)
        .bind(failure_reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// One-time cleanup variant (§4.8): tags rows with
    /// `one_time_cleanup_timeout` and tolerates a missing
    /// `status_timestamp` by falling back to `start_time`.
    pub async fn one_time_cleanup(&self, now: DateTime<Utc>, max_age_secs: i64) -> Result<u64, DispatchError> {
        let result = sqlx::query(
            r#"
            UPDATE active_calls
            SET status = 'failed',
                status_timestamp = $1,
                failure_reason = 'one_time_cleanup_timeout',
                end_time = $1
            WHERE status IN ('processed', 'ringing', 'ongoing')
              AND COALESCE(status_timestamp, start_time) < $1 - make_interval(secs => $2)
            "#,
        )
        .bind(now)
        .bind(max_age_secs as f64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_url() -> Option<String> {
        std::env::var("DATABASE_URL").ok()
    }

    /// §8 P1/P3: transition is a no-op once a row is terminal. Runs only
    /// against a real database; skipped otherwise.
    #[tokio::test]
    async fn terminal_transition_is_sticky() {
        let Some(url) = pool_url() else {
            eprintln!("skipping: DATABASE_URL not set");
            return;
        };
        let pool = PgPool::connect(&url).await.expect("connect");
        let ledger = ActiveCallLedger::new(pool);

        let call_uuid = format!("test-{}", uuid::Uuid::new_v4());
        let client_id = Uuid::new_v4();

        ledger
            .insert(NewActiveCall {
                call_uuid: call_uuid.clone(),
                client_id,
                campaign_id: None,
                from_number: "+15550000000".into(),
                to_number: "+15551111111".into(),
                provider: core_models::Provider::Plivo,
                status: CallStatus::Processed,
                start_time: Some(Utc::now()),
                failure_reason: None,
                warmup_attempts: 0,
                warmup_duration_ms: None,
                contact_index: 0,
                sequence_number: 0,
                contact_data: serde_json::json!({}),
                context_flags: core_models::ContextFlags::default(),
            })
            .await
            .unwrap();

        let first = ledger
            .transition(&call_uuid, CallStatus::CallEnded, TransitionFields::default())
            .await
            .unwrap();
        assert!(first);

        let second = ledger
            .transition(&call_uuid, CallStatus::Ongoing, TransitionFields::default())
            .await
            .unwrap();
        assert!(second, "no-op transition on a terminal row still reports success");

        let row = ledger.find_by_call_uuid(&call_uuid).await.unwrap().unwrap();
        assert_eq!(row.status, CallStatus::CallEnded);
    }
}
