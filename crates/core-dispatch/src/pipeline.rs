//! The Call Pipeline (§4.6 `processSingleCall`): the fixed sequence every
//! dispatch attempt traverses. Each stage either advances or terminates
//! the attempt with a labeled outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use core_models::validation::{validate_phone_number, validate_wss_url};
use core_models::{ContextFlags, FailureReason, NewActiveCall, Provider};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::gate::ConcurrencyGate;
use crate::ledger::ActiveCallLedger;
use crate::router_port::{CallRouter, DispatchCallParams, RouterFailureKind};
use crate::sweeper::TimeoutSweeper;
use crate::warmup::BotWarmupClient;
use core_models::active_call::synthetic_failed_call_uuid;

#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub client_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub client_max_concurrent_calls: Option<i32>,
    pub from_number: String,
    pub to_number: String,
    pub wss_url: String,
    pub contact_data: serde_json::Value,
    pub context_flags: ContextFlags,
    pub contact_index: i64,
    pub sequence_number: i64,
    pub provider_override: Option<Provider>,
    /// Shorter-than-default gate wait ceiling, if the caller has one.
    pub max_gate_wait: Option<Duration>,
}

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// §4.6: dispatch succeeded, a ledger row exists.
    Success {
        call_uuid: String,
        provider: Provider,
        processing_time: Duration,
        warmup_time: Duration,
        wait_time: Duration,
    },
    /// §4.2/§7: the gate could not grant a slot within its bound. The
    /// caller (Campaign Worker) must pause the campaign, not retry the
    /// contact.
    ShouldPauseCampaign,
    /// §4.6 stage 4: malformed contact data. A synthetic failed row is
    /// still recorded so campaign accounting sees the contact (see
    /// `FailureReason::InvalidContactData`).
    ValidationFailed { message: String },
    /// §4.3/§4.5/§4.4: the call could not be placed. A failed ledger row
    /// was recorded; the campaign worker advances its cursor and
    /// continues.
    CallFailed {
        call_uuid: String,
        failure_reason: FailureReason,
        message: String,
    },
}

pub struct CallPipeline {
    ledger: Arc<ActiveCallLedger>,
    sweeper: Arc<TimeoutSweeper>,
    gate: Arc<ConcurrencyGate>,
    warmup: Arc<BotWarmupClient>,
    router: Arc<dyn CallRouter>,
}

impl CallPipeline {
    pub fn new(
        ledger: Arc<ActiveCallLedger>,
        sweeper: Arc<TimeoutSweeper>,
        gate: Arc<ConcurrencyGate>,
        warmup: Arc<BotWarmupClient>,
        router: Arc<dyn CallRouter>,
    ) -> Self {
        Self {
            ledger,
            sweeper,
            gate,
            warmup,
            router,
        }
    }

    pub async fn process_single_call(&self, input: PipelineInput) -> Result<PipelineOutcome, DispatchError> {
        let started = Instant::now();

        // Stage 1: lazy sweep. Concurrency counts must be accurate at the
        // moment of the next dispatch decision (§4.8 rationale).
        if let Err(e) = self.sweeper.sweep().await {
            tracing::warn!(error = %e, "lazy sweep failed, continuing with dispatch");
        }

        // Stage 2: gate wait.
        let wait_outcome = self
            .gate
            .wait_for_slot(input.client_id, input.client_max_concurrent_calls, input.max_gate_wait)
            .await?;
        if !wait_outcome.success {
            return Ok(PipelineOutcome::ShouldPauseCampaign);
        }

        // Stage 3: bot warmup.
        let warmup_outcome = self.warmup.warm_up(&input.wss_url).await;
        if !warmup_outcome.success {
            let call_uuid = synthetic_failed_call_uuid();
            self.insert_failed_row(
                &call_uuid,
                &input,
                FailureReason::BotNotReady,
                None,
            )
            .await?;
            return Ok(PipelineOutcome::CallFailed {
                call_uuid,
                failure_reason: FailureReason::BotNotReady,
                message: warmup_outcome.error.unwrap_or_else(|| "bot warmup failed".to_string()),
            });
        }

        // Stage 4: parameter validation.
        if let Err(e) = validate_phone_number(&input.from_number)
            .and_then(|_| validate_phone_number(&input.to_number))
            .and_then(|_| validate_wss_url(&input.wss_url))
        {
            let call_uuid = synthetic_failed_call_uuid();
            self.insert_failed_row(&call_uuid, &input, FailureReason::InvalidContactData, None)
                .await?;
            return Ok(PipelineOutcome::ValidationFailed { message: e.to_string() });
        }

        // Stage 5: router dispatch.
        let router_params = DispatchCallParams {
            client_id: input.client_id,
            campaign_id: input.campaign_id,
            from_number: input.from_number.clone(),
            to_number: input.to_number.clone(),
            wss_url: input.wss_url.clone(),
            contact_data: input.contact_data.clone(),
            include_global_context: input.context_flags.include_global_context,
            include_agent_context: input.context_flags.include_agent_context,
            contact_index: input.contact_index,
            sequence_number: input.sequence_number,
            provider_override: input.provider_override,
        };

        let dispatch_result = self.router.dispatch(router_params).await;

        let (call_uuid, provider) = match dispatch_result {
            Ok(success) => (success.call_uuid, success.provider),
            Err(failure) => {
                let failure_reason = match failure.kind {
                    RouterFailureKind::ApiCallFailed => FailureReason::ApiCallFailed,
                    RouterFailureKind::ApiException => FailureReason::ApiException,
                };

                // Twilio pre-reserves a ledger row before its API call; if
                // that row already carries this failure (written by the
                // adapter itself), inserting a second synthetic row would
                // double-count the contact against P2.
                let call_uuid = match failure.already_recorded {
                    Some(existing_uuid) => existing_uuid,
                    None => {
                        let call_uuid = synthetic_failed_call_uuid();
                        self.insert_failed_row(&call_uuid, &input, failure_reason, None).await?;
                        call_uuid
                    }
                };

                return Ok(PipelineOutcome::CallFailed {
                    call_uuid,
                    failure_reason,
                    message: failure.message,
                });
            }
        };

        // Stage 6: ACL insert (idempotent — Twilio may have already
        // pre-reserved this row; duplicate is coalesced to success, I6).
        self.ledger
            .insert(NewActiveCall {
                call_uuid: call_uuid.clone(),
                client_id: input.client_id,
                campaign_id: input.campaign_id,
                from_number: input.from_number.clone(),
                to_number: input.to_number.clone(),
                provider,
                status: core_models::CallStatus::Processed,
                start_time: Some(chrono::Utc::now()),
                failure_reason: None,
                warmup_attempts: warmup_outcome.attempts as i32,
                warmup_duration_ms: Some(warmup_outcome.duration.as_millis() as i64),
                contact_index: input.contact_index,
                sequence_number: input.sequence_number,
                contact_data: input.contact_data.clone(),
                context_flags: input.context_flags,
            })
            .await?;

        Ok(PipelineOutcome::Success {
            call_uuid,
            provider,
            processing_time: started.elapsed(),
            warmup_time: warmup_outcome.duration,
            wait_time: wait_outcome.wait_time,
        })
    }

    async fn insert_failed_row(
        &self,
        call_uuid: &str,
        input: &PipelineInput,
        failure_reason: FailureReason,
        provider: Option<Provider>,
    ) -> Result<(), DispatchError> {
        self.ledger
            .insert(NewActiveCall {
                call_uuid: call_uuid.to_string(),
                client_id: input.client_id,
                campaign_id: input.campaign_id,
                from_number: input.from_number.clone(),
                to_number: input.to_number.clone(),
                // A synthetic failed row still needs a provider tag for
                // reporting; default to Plivo when none was chosen yet —
                // the call never reached a provider either way.
                provider: provider.unwrap_or(Provider::Plivo),
                status: core_models::CallStatus::Failed,
                start_time: None,
                failure_reason: Some(failure_reason),
                warmup_attempts: 0,
                warmup_duration_ms: None,
                contact_index: input.contact_index,
                sequence_number: input.sequence_number,
                contact_data: input.contact_data.clone(),
                context_flags: input.context_flags,
            })
            .await?;
        Ok(())
    }
}
