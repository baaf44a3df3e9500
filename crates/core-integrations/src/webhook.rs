//! Webhook Ingress (§4.7): pure transition logic shared by both providers'
//! HTTP handlers. The `backend-api` routes parse the wire payload, resolve
//! the `call_uuid`, and call into `apply_transition` here so the mapping
//! rules live in one place and are unit-testable without a pool or server.

use core_dispatch::ledger::{ActiveCallLedger, TransitionFields};
use core_models::CallStatus;

use crate::error::IntegrationError;
use crate::status_map::{plivo_hangup_cause_to_failure_reason, twilio_failure_reason, twilio_status_to_call_status};

/// One normalized event extracted from a provider webhook payload.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    Ring,
    Answer,
    Hangup { duration_secs: Option<i64>, hangup_cause: Option<String> },
    TwilioStatus { status: String },
}

/// Apply a normalized webhook event to the ledger row for `call_uuid`.
/// Unknown `call_uuid` is logged and ignored — no ghost rows are created
/// (§4.7). Terminal rows are left untouched by `ActiveCallLedger::transition`
/// itself (P3), so this function doesn't need to special-case that.
pub async fn apply_transition(
    ledger: &ActiveCallLedger,
    call_uuid: &str,
    event: WebhookEvent,
) -> Result<bool, IntegrationError> {
    let existing = ledger.find_by_call_uuid(call_uuid).await?;
    if existing.is_none() {
        tracing::warn!(call_uuid, "webhook for unknown call_uuid ignored");
        return Ok(false);
    }

    let (new_status, fields) = match event {
        WebhookEvent::Ring => (CallStatus::Ringing, TransitionFields::default()),
        WebhookEvent::Answer => (CallStatus::Ongoing, TransitionFields::default()),
        WebhookEvent::Hangup { duration_secs, hangup_cause } => {
            let failure_reason = hangup_cause.as_deref().and_then(plivo_hangup_cause_to_failure_reason);
            match failure_reason {
                Some(reason) => (
                    CallStatus::Failed,
                    TransitionFields {
                        end_time: Some(chrono::Utc::now()),
                        duration_secs,
                        end_reason: hangup_cause,
                        failure_reason: Some(reason),
                    },
                ),
                None => (
                    CallStatus::CallEnded,
                    TransitionFields {
                        end_time: Some(chrono::Utc::now()),
                        duration_secs,
                        end_reason: hangup_cause,
                        failure_reason: None,
                    },
                ),
            }
        }
        WebhookEvent::TwilioStatus { status } => {
            let Some(mapped) = twilio_status_to_call_status(&status) else {
                tracing::warn!(call_uuid, status, "unrecognized twilio status, ignoring");
                return Ok(false);
            };
            let fields = if mapped == CallStatus::Failed {
                TransitionFields {
                    end_time: Some(chrono::Utc::now()),
                    duration_secs: None,
                    end_reason: Some(status.clone()),
                    failure_reason: Some(twilio_failure_reason(&status)),
                }
            } else if mapped == CallStatus::CallEnded {
                TransitionFields {
                    end_time: Some(chrono::Utc::now()),
                    duration_secs: None,
                    end_reason: Some(status.clone()),
                    failure_reason: None,
                }
            } else {
                TransitionFields::default()
            };
            (mapped, fields)
        }
    };

    let applied = ledger.transition(call_uuid, new_status, fields).await?;
    Ok(applied)
}

/// Resolve a Twilio `CallSid` to the `call_uuid` it was pre-reserved under
/// (§4.7: "for Twilio, `twilioCallSid` which resolves to `callUUID`").
pub async fn resolve_twilio_call_uuid(
    ledger: &ActiveCallLedger,
    call_sid: &str,
) -> Result<Option<String>, IntegrationError> {
    let row = ledger.find_by_twilio_sid(call_sid).await?;
    Ok(row.map(|r| r.call_uuid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_models::{ContextFlags, NewActiveCall, Provider};
    use uuid::Uuid;

    fn pool_url() -> Option<String> {
        std::env::var("DATABASE_URL").ok()
    }

    /// §8 scenario 3: a ring webhook followed by a late hangup after the
    /// sweeper has already marked the row failed is a no-op.
    #[tokio::test]
    async fn unknown_call_uuid_is_ignored_not_created() {
        let Some(url) = pool_url() else {
            eprintln!("skipping: DATABASE_URL not set");
            return;
        };
        let pool = sqlx::PgPool::connect(&url).await.unwrap();
        let ledger = ActiveCallLedger::new(pool);

        let applied = apply_transition(&ledger, "does-not-exist", WebhookEvent::Ring).await.unwrap();
        assert!(!applied);
    }

    #[tokio::test]
    async fn ring_then_answer_transitions_in_order() {
        let Some(url) = pool_url() else {
            eprintln!("skipping: DATABASE_URL not set");
            return;
        };
        let pool = sqlx::PgPool::connect(&url).await.unwrap();
        let ledger = ActiveCallLedger::new(pool);

        let call_uuid = format!("webhook-test-{}", Uuid::new_v4());
        ledger
            .insert(NewActiveCall {
                call_uuid: call_uuid.clone(),
                client_id: Uuid::new_v4(),
                campaign_id: None,
                from_number: "+15550000000".into(),
                to_number: "+15551111111".into(),
                provider: Provider::Plivo,
                status: CallStatus::Processed,
                start_time: Some(chrono::Utc::now()),
                failure_reason: None,
                warmup_attempts: 0,
                warmup_duration_ms: None,
                contact_index: 0,
                sequence_number: 0,
                contact_data: serde_json::json!({}),
                context_flags: ContextFlags::default(),
            })
            .await
            .unwrap();

        assert!(apply_transition(&ledger, &call_uuid, WebhookEvent::Ring).await.unwrap());
        assert!(apply_transition(&ledger, &call_uuid, WebhookEvent::Answer).await.unwrap());

        let row = ledger.find_by_call_uuid(&call_uuid).await.unwrap().unwrap();
        assert_eq!(row.status, CallStatus::Ongoing);
    }
}
