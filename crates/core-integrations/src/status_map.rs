//! Provider status-code → common vocabulary mapping tables (§4.4, §4.7).
//! Kept as one small file per provider so adding a third provider is a
//! one-file change, not a scattered edit.

use core_models::{CallStatus, FailureReason};

/// Twilio call statuses, mapped to the common `CallStatus` vocabulary.
/// `queued|initiated -> processed`, `ringing -> ringing`,
/// `in-progress -> ongoing`, `completed -> call-ended`,
/// `busy|failed|no-answer|canceled -> failed`.
pub fn twilio_status_to_call_status(twilio_status: &str) -> Option<CallStatus> {
    match twilio_status {
        "queued" | "initiated" => Some(CallStatus::Processed),
        "ringing" => Some(CallStatus::Ringing),
        "in-progress" => Some(CallStatus::Ongoing),
        "completed" => Some(CallStatus::CallEnded),
        "busy" | "failed" | "no-answer" | "canceled" => Some(CallStatus::Failed),
        _ => None,
    }
}

/// Twilio failure-status → `FailureReason`. Only called when the mapped
/// `CallStatus` is `Failed`.
pub fn twilio_failure_reason(twilio_status: &str) -> FailureReason {
    match twilio_status {
        "busy" | "no-answer" | "canceled" => FailureReason::ApiCallFailed,
        _ => FailureReason::ApiException,
    }
}

/// Plivo event names used on the ring/answer/hangup webhook endpoints
/// (§4.7). Plivo does not multiplex onto one status-callback the way
/// Twilio does; each endpoint implies its own transition.
pub fn plivo_hangup_cause_to_failure_reason(hangup_cause: &str) -> Option<FailureReason> {
    match hangup_cause {
        "NORMAL_CLEARING" => None,
        _ => Some(FailureReason::ApiCallFailed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twilio_terminal_statuses_map_to_failed() {
        assert_eq!(twilio_status_to_call_status("busy"), Some(CallStatus::Failed));
        assert_eq!(twilio_status_to_call_status("no-answer"), Some(CallStatus::Failed));
        assert_eq!(twilio_status_to_call_status("completed"), Some(CallStatus::CallEnded));
    }

    #[test]
    fn twilio_unknown_status_is_none() {
        assert_eq!(twilio_status_to_call_status("some-future-status"), None);
    }
}
