//! Twilio adapter (§4.4) and inbound webhook signature verification
//! (§4.7). Twilio's call is placed only after a `call_uuid` is
//! pre-reserved in the Active-Call Ledger, closing the race where the
//! status callback for `in-progress` arrives before `client.calls.create`
//! returns (§9: "pre-reserved UUIDs for Twilio").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use core_dispatch::ledger::ActiveCallLedger;
use core_models::client::TwilioCredentials;
use core_models::validation::validate_twilio_sid;
use core_models::{CallStatus, FailureReason};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::adapter::{AdapterFailure, AdapterFailureKind, AdapterSuccess, CallAdapter, CallParams};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

pub struct TwilioAdapter {
    http: Client,
    credentials: TwilioCredentials,
    base_url: String,
    timeout: Duration,
    ledger: Arc<ActiveCallLedger>,
}

impl TwilioAdapter {
    pub fn new(
        http: Client,
        credentials: TwilioCredentials,
        base_url: String,
        timeout: Duration,
        ledger: Arc<ActiveCallLedger>,
    ) -> Self {
        Self {
            http,
            credentials,
            base_url,
            timeout,
            ledger,
        }
    }

    fn status_callback_url(&self) -> String {
        format!("{}/twilio/status-callback", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct TwilioCallResponse {
    sid: String,
}

#[async_trait]
impl CallAdapter for TwilioAdapter {
    async fn make_call(&self, params: CallParams) -> Result<AdapterSuccess, AdapterFailure> {
        if let Err(e) = self.validate_config() {
            return Err(AdapterFailure {
                kind: AdapterFailureKind::ApiCallFailed,
                error: e,
                error_details: None,
                pre_reserved_call_uuid: None,
            });
        }

        let call_uuid = Uuid::new_v4().to_string();

        let new_call = core_models::NewActiveCall {
            call_uuid: call_uuid.clone(),
            client_id: params.client_id,
            campaign_id: params.campaign_id,
            from_number: params.from_number.clone(),
            to_number: params.to_number.clone(),
            provider: core_models::Provider::Twilio,
            status: CallStatus::Processed,
            start_time: Some(chrono::Utc::now()),
            failure_reason: None,
            warmup_attempts: 0,
            warmup_duration_ms: None,
            contact_index: 0,
            sequence_number: 0,
            contact_data: params.contact_data.clone(),
            context_flags: core_models::ContextFlags {
                include_global_context: params.include_global_context,
                include_agent_context: params.include_agent_context,
            },
        };

        if let Err(e) = self.ledger.insert(new_call).await {
            return Err(AdapterFailure {
                kind: AdapterFailureKind::ApiException,
                error: format!("failed to pre-reserve ledger row: {}", e),
                error_details: None,
                pre_reserved_call_uuid: None,
            });
        }

        let twiml = generate_twiml(&params);
        let endpoint = format!("{}/Accounts/{}/Calls.json", TWILIO_API_BASE, self.credentials.account_sid);

        let mut form = HashMap::new();
        form.insert("To", params.to_number.clone());
        form.insert("From", params.from_number.clone());
        form.insert("Twiml", twiml);
        form.insert("StatusCallback", self.status_callback_url());
        form.insert(
            "StatusCallbackEvent",
            "initiated ringing answered completed".to_string(),
        );

        let response = self
            .http
            .post(&endpoint)
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                self.mark_pre_reserved_row_failed(&call_uuid, FailureReason::ApiException).await;
                return Err(AdapterFailure {
                    kind: AdapterFailureKind::ApiException,
                    error: e.to_string(),
                    error_details: None,
                    pre_reserved_call_uuid: Some(call_uuid.clone()),
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.ok().map(|t| serde_json::json!({ "body": t }));
            self.mark_pre_reserved_row_failed(&call_uuid, FailureReason::ApiCallFailed).await;
            return Err(AdapterFailure {
                kind: AdapterFailureKind::ApiCallFailed,
                error: format!("twilio call API returned HTTP {}", status),
                error_details: details,
                pre_reserved_call_uuid: Some(call_uuid.clone()),
            });
        }

        let parsed: TwilioCallResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                self.mark_pre_reserved_row_failed(&call_uuid, FailureReason::ApiException).await;
                return Err(AdapterFailure {
                    kind: AdapterFailureKind::ApiException,
                    error: format!("failed to parse twilio response: {}", e),
                    error_details: None,
                    pre_reserved_call_uuid: Some(call_uuid.clone()),
                });
            }
        };

        if let Err(e) = self.ledger.update_after_start(&call_uuid, &parsed.sid).await {
            tracing::warn!(call_uuid, error = %e, "failed to record twilio_call_sid on pre-reserved row");
        }

        Ok(AdapterSuccess {
            call_uuid,
            provider_response: serde_json::json!({ "sid": parsed.sid }),
        })
    }

    fn validate_config(&self) -> Result<(), String> {
        validate_twilio_sid(&self.credentials.account_sid).map_err(|e| e.to_string())
    }

    fn webhook_urls(&self) -> Vec<String> {
        vec![self.status_callback_url()]
    }
}

impl TwilioAdapter {
    async fn mark_pre_reserved_row_failed(&self, call_uuid: &str, reason: FailureReason) {
        let fields = core_dispatch::ledger::TransitionFields {
            end_time: Some(chrono::Utc::now()),
            duration_secs: Some(0),
            end_reason: Some("adapter_api_failure".to_string()),
            failure_reason: Some(reason),
        };
        if let Err(e) = self.ledger.transition(call_uuid, CallStatus::Failed, fields).await {
            tracing::error!(call_uuid, error = %e, "failed to mark pre-reserved row as failed");
        }
    }
}

/// TwiML that opens a media stream to `wssUrl`, with every contact field
/// (plus context flags) passed as `<Parameter>` elements (§4.4).
pub fn generate_twiml(params: &CallParams) -> String {
    let mut parameters = String::new();
    if let Value::Object(map) = &params.contact_data {
        for (key, value) in map {
            if key == "_id" || key == "listId" {
                continue;
            }
            let flat = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            parameters.push_str(&format!(
                "<Parameter name=\"{}\" value=\"{}\"/>",
                xml_escape(key),
                xml_escape(&flat)
            ));
        }
    }
    parameters.push_str(&format!(
        "<Parameter name=\"includeGlobalContext\" value=\"{}\"/>",
        params.include_global_context
    ));
    parameters.push_str(&format!(
        "<Parameter name=\"includeAgentContext\" value=\"{}\"/>",
        params.include_agent_context
    ));

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Connect><Stream url=\"{}\">{}</Stream></Connect></Response>",
        xml_escape(&params.wss_url),
        parameters
    )
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Verify `X-Twilio-Signature` per
/// https://www.twilio.com/docs/usage/security#validating-requests.
pub fn verify_signature(url: &str, params: &HashMap<String, String>, auth_token: &str, signature: &str) -> bool {
    let mut sorted_keys: Vec<&String> = params.keys().collect();
    sorted_keys.sort();

    let mut data = url.to_string();
    for key in sorted_keys {
        data.push_str(key);
        data.push_str(params.get(key).unwrap_or(&String::new()));
    }

    type HmacSha1 = Hmac<sha1::Sha1>;
    let mut mac = match HmacSha1::new_from_slice(auth_token.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(data.as_bytes());
    let expected = base64::encode(mac.finalize().into_bytes());

    signature == expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_params() -> CallParams {
        CallParams {
            client_id: Uuid::new_v4(),
            campaign_id: None,
            from_number: "+15550000000".into(),
            to_number: "+15551111111".into(),
            wss_url: "wss://bot.example.com/media".into(),
            contact_data: serde_json::json!({"_id": "abc", "listId": "l1", "firstName": "Ada & Co"}),
            include_global_context: true,
            include_agent_context: false,
        }
    }

    #[test]
    fn twiml_includes_stream_url_and_escaped_parameters() {
        let twiml = generate_twiml(&sample_params());
        assert!(twiml.contains("<Stream url=\"wss://bot.example.com/media\">"));
        assert!(twiml.contains("name=\"firstName\" value=\"Ada &amp; Co\""));
        assert!(!twiml.contains("name=\"_id\""));
        assert!(!twiml.contains("name=\"listId\""));
        assert!(twiml.contains("includeGlobalContext"));
    }

    #[test]
    fn signature_round_trips() {
        let mut params = HashMap::new();
        params.insert("CallSid".to_string(), "CA123".to_string());
        params.insert("From".to_string(), "+15550000000".to_string());

        let url = "https://api.example.com/twilio/status-callback";
        let token = "test-auth-token";

        let mut data = url.to_string();
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();
        for k in keys {
            data.push_str(k);
            data.push_str(params.get(k).unwrap());
        }
        type HmacSha1 = Hmac<sha1::Sha1>;
        let mut mac = HmacSha1::new_from_slice(token.as_bytes()).unwrap();
        mac.update(data.as_bytes());
        let signature = base64::encode(mac.finalize().into_bytes());

        assert!(verify_signature(url, &params, token, &signature));
        assert!(!verify_signature(url, &params, token, "wrong-signature"));
    }
}
