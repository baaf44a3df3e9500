//! Plivo adapter (§4.4): POST to `/v1/Account/{sid}/Call/` with HTTP Basic
//! auth. `answer_url` carries every contact field as a flat query
//! parameter (no nesting) — the downstream IVR script reads them that way.

use std::time::Duration;

use async_trait::async_trait;
use core_models::client::PlivoCredentials;
use core_models::validation::validate_plivo_sid;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::adapter::{AdapterFailure, AdapterFailureKind, AdapterSuccess, CallAdapter, CallParams};

const PLIVO_API_BASE: &str = "https://api.plivo.com/v1";

pub struct PlivoAdapter {
    http: Client,
    credentials: PlivoCredentials,
    base_url: String,
    timeout: Duration,
}

impl PlivoAdapter {
    pub fn new(http: Client, credentials: PlivoCredentials, base_url: String, timeout: Duration) -> Self {
        Self {
            http,
            credentials,
            base_url,
            timeout,
        }
    }

    /// `/ip/xml-plivo` answer URL, with `wss`, `clientId`, `campId`, and
    /// every contact field (except `_id`/`listId`) as flat query params
    /// (§6: "the answer URL carries contact fields as query parameters").
    fn answer_url(&self, params: &CallParams) -> String {
        let mut url = Url::parse(&format!("{}/ip/xml-plivo", self.base_url))
            .expect("base_url + fixed path is always a valid URL");

        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("wss", &params.wss_url);
            qp.append_pair("clientId", &params.client_id.to_string());
            if let Some(campaign_id) = params.campaign_id {
                qp.append_pair("campId", &campaign_id.to_string());
            }

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
                    qp.append_pair(key, &flat);
                }
            }
        }

        url.into()
    }

    fn ring_url(&self) -> String {
        format!("{}/plivo/ring-url", self.base_url)
    }

    fn hangup_url(&self) -> String {
        format!("{}/plivo/hangup-url", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct PlivoCallResponse {
    #[serde(rename = "request_uuid")]
    request_uuid: String,
    #[serde(flatten)]
    rest: Value,
}

#[async_trait]
impl CallAdapter for PlivoAdapter {
    async fn make_call(&self, params: CallParams) -> Result<AdapterSuccess, AdapterFailure> {
        if let Err(e) = self.validate_config() {
            return Err(AdapterFailure {
                kind: AdapterFailureKind::ApiCallFailed,
                error: e,
                error_details: None,
                pre_reserved_call_uuid: None,
            });
        }

        let endpoint = format!("{}/Account/{}/Call/", PLIVO_API_BASE, self.credentials.auth_id);

        let body = serde_json::json!({
            "from": params.from_number,
            "to": params.to_number,
            "answer_url": self.answer_url(&params),
            "answer_method": "POST",
            "ring_url": self.ring_url(),
            "hangup_url": self.hangup_url(),
        });

        let response = self
            .http
            .post(&endpoint)
            .basic_auth(&self.credentials.auth_id, Some(&self.credentials.auth_token))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterFailure {
                kind: AdapterFailureKind::ApiException,
                error: e.to_string(),
                error_details: None,
                pre_reserved_call_uuid: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.ok().map(|t| serde_json::json!({ "body": t }));
            return Err(AdapterFailure {
                kind: AdapterFailureKind::ApiCallFailed,
                error: format!("plivo call API returned HTTP {}", status),
                error_details: details,
                pre_reserved_call_uuid: None,
            });
        }

        let parsed: PlivoCallResponse = response.json().await.map_err(|e| AdapterFailure {
            kind: AdapterFailureKind::ApiException,
            error: format!("failed to parse plivo response: {}", e),
            error_details: None,
            pre_reserved_call_uuid: None,
        })?;

        Ok(AdapterSuccess {
            call_uuid: parsed.request_uuid,
            provider_response: parsed.rest,
        })
    }

    fn validate_config(&self) -> Result<(), String> {
        validate_plivo_sid(&self.credentials.auth_id).map_err(|e| e.to_string())
    }

    fn webhook_urls(&self) -> Vec<String> {
        vec![self.ring_url(), self.hangup_url()]
    }
}

/// Plivo XML for the `/ip/xml-plivo` answer callback: opens a
/// bidirectional media stream to `wss`, mirroring `twilio::generate_twiml`
/// for the sibling provider. `query` is whatever `answer_url` appended
/// (`wss`, `clientId`, `campId`, flattened contact fields).
pub fn generate_answer_xml(query: &std::collections::HashMap<String, String>) -> String {
    let wss = query.get("wss").map(String::as_str).unwrap_or_default();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Stream bidirectional=\"true\" keepCallAlive=\"true\">{}</Stream></Response>",
        xml_escape(wss)
    )
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_params() -> CallParams {
        CallParams {
            client_id: Uuid::new_v4(),
            campaign_id: Some(Uuid::new_v4()),
            from_number: "+15550000000".into(),
            to_number: "+15551111111".into(),
            wss_url: "wss://bot.example.com/media".into(),
            contact_data: serde_json::json!({"_id": "abc", "listId": "l1", "firstName": "Ada"}),
            include_global_context: false,
            include_agent_context: false,
        }
    }

    #[test]
    fn answer_url_flattens_contact_fields_and_drops_internal_keys() {
        let adapter = PlivoAdapter::new(
            Client::new(),
            PlivoCredentials {
                auth_id: "MAXXXXXXXXXXXXXXXXXX".into(),
                auth_token: "secret".into(),
                validated_phone_numbers: vec![],
            },
            "https://api.example.com".into(),
            Duration::from_secs(30),
        );

        let url = adapter.answer_url(&sample_params());
        assert!(url.contains("firstName=Ada"));
        assert!(!url.contains("_id="));
        assert!(!url.contains("listId=l1"));
        assert!(url.contains("wss=wss%3A%2F%2Fbot.example.com%2Fmedia") || url.contains("wss=wss"));
    }

    #[test]
    fn answer_xml_embeds_wss_url() {
        let mut query = std::collections::HashMap::new();
        query.insert("wss".to_string(), "wss://bot.example.com/media".to_string());
        let xml = generate_answer_xml(&query);
        assert!(xml.contains("<Stream bidirectional=\"true\""));
        assert!(xml.contains("wss://bot.example.com/media"));
    }
}
