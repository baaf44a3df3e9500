//! Telephony provider and call-lifecycle vocabulary shared by every crate
//! that touches a call record.

use serde::{Deserialize, Serialize};

/// Supported outbound telephony providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Plivo,
    Twilio,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Plivo => "plivo",
            Provider::Twilio => "twilio",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "plivo" => Some(Provider::Plivo),
            "twilio" => Some(Provider::Twilio),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle states an [`crate::ActiveCall`] row can be in. §3 invariant
/// I2: `Processed | Ringing | Ongoing` count against concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Processed,
    Ringing,
    Ongoing,
    CallEnded,
    Failed,
    Timeout,
}

impl CallStatus {
    /// Statuses that count against a client's/global concurrency cap.
    pub fn is_active(&self) -> bool {
        matches!(self, CallStatus::Processed | CallStatus::Ringing | CallStatus::Ongoing)
    }

    /// Statuses that are sticky: once reached, webhooks are no-ops (P3).
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::CallEnded | CallStatus::Failed | CallStatus::Timeout)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Processed => "processed",
            CallStatus::Ringing => "ringing",
            CallStatus::Ongoing => "ongoing",
            CallStatus::CallEnded => "call-ended",
            CallStatus::Failed => "failed",
            CallStatus::Timeout => "timeout",
        }
    }
}

/// Reason a call ended in `failed`/`timeout`. §3 invariant I5: present iff
/// status is `failed` or `timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    BotNotReady,
    ApiCallFailed,
    ApiException,
    WebhookTimeout,
    OneTimeCleanupTimeout,
    /// Supplement to the spec's taxonomy: the contact row failed
    /// parameter validation (§4.6 stage 4) before any provider was
    /// invoked. Recorded as a ledger row (rather than silently skipped)
    /// so campaign accounting (P2) still sees exactly one row per
    /// contact.
    InvalidContactData,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::BotNotReady => "bot_not_ready",
            FailureReason::ApiCallFailed => "api_call_failed",
            FailureReason::ApiException => "api_exception",
            FailureReason::WebhookTimeout => "webhook_timeout",
            FailureReason::OneTimeCleanupTimeout => "one_time_cleanup_timeout",
            FailureReason::InvalidContactData => "invalid_contact_data",
        }
    }
}

/// Per-call flags controlling how much conversational context the bot is
/// handed when the media stream opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContextFlags {
    #[serde(default)]
    pub include_global_context: bool,
    #[serde(default)]
    pub include_agent_context: bool,
}

/// Campaign lifecycle, §3 Campaign / §4.9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Running,
    Paused,
    Completed,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Running => "running",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_statuses_match_spec_i2() {
        assert!(CallStatus::Processed.is_active());
        assert!(CallStatus::Ringing.is_active());
        assert!(CallStatus::Ongoing.is_active());
        assert!(!CallStatus::CallEnded.is_active());
        assert!(!CallStatus::Failed.is_active());
        assert!(!CallStatus::Timeout.is_active());
    }

    #[test]
    fn terminal_statuses_are_sticky() {
        assert!(CallStatus::CallEnded.is_terminal());
        assert!(CallStatus::Failed.is_terminal());
        assert!(CallStatus::Timeout.is_terminal());
        assert!(!CallStatus::Ongoing.is_terminal());
    }

    #[test]
    fn provider_round_trips_through_str() {
        assert_eq!(Provider::from_str("Plivo"), Some(Provider::Plivo));
        assert_eq!(Provider::from_str("TWILIO"), Some(Provider::Twilio));
        assert_eq!(Provider::from_str("sip"), None);
    }
}
