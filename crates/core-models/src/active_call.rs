//! The Active-Call Ledger row (§3 `ActiveCall`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::{CallStatus, ContextFlags, FailureReason, Provider};

/// One row of the authoritative active-call ledger. Never deleted — it is
/// the audit record for a dispatch attempt (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActiveCall {
    /// Unique per §3 invariant I1. Provider request UUID for Plivo,
    /// pre-reserved UUID for Twilio, `FAILED_<ts>_<rand>` for API-failure
    /// rows that never reached a provider.
    pub call_uuid: String,
    pub client_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub from_number: String,
    pub to_number: String,
    pub provider: Provider,
    pub status: CallStatus,
    pub status_timestamp: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub end_reason: Option<String>,
    pub failure_reason: Option<FailureReason>,
    pub warmup_attempts: i32,
    pub warmup_duration_ms: Option<i64>,
    pub contact_index: i64,
    pub sequence_number: i64,
    pub contact_data: serde_json::Value,
    pub context_flags: serde_json::Value,
    pub twilio_call_sid: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActiveCall {
    pub fn context_flags(&self) -> ContextFlags {
        serde_json::from_value(self.context_flags.clone()).unwrap_or_default()
    }
}

/// Everything the Call Pipeline knows before a row is inserted. Built up
/// stage by stage and handed to `ActiveCallLedger::insert` once a
/// `call_uuid` exists (§4.6).
#[derive(Debug, Clone)]
pub struct NewActiveCall {
    pub call_uuid: String,
    pub client_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub from_number: String,
    pub to_number: String,
    pub provider: Provider,
    pub status: CallStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub failure_reason: Option<FailureReason>,
    pub warmup_attempts: i32,
    pub warmup_duration_ms: Option<i64>,
    pub contact_index: i64,
    pub sequence_number: i64,
    pub contact_data: serde_json::Value,
    pub context_flags: ContextFlags,
}

/// Synthesize the unique id used for rows that never reached a provider
/// (warmup failures, router/adapter failures before a `call_uuid` existed).
pub fn synthetic_failed_call_uuid() -> String {
    use rand::Rng;
    let ts = Utc::now().timestamp_millis();
    let rand_suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("FAILED_{}_{:06}", ts, rand_suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_uuids_are_unique_and_prefixed() {
        let a = synthetic_failed_call_uuid();
        let b = synthetic_failed_call_uuid();
        assert!(a.starts_with("FAILED_"));
        assert!(b.starts_with("FAILED_"));
        assert_ne!(a, b);
    }
}
