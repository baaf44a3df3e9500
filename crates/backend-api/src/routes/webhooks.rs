//! Webhook ingress (§4.7): Plivo's three-endpoint callback scheme and
//! Twilio's single status-callback, plus the answer-time XML responses
//! each provider expects. No auth middleware runs in front of these —
//! they're public endpoints validated by provider-specific means
//! (Twilio signature, Plivo `call_uuid` existence in the ledger).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Router,
};
use core_integrations::providers::{plivo, twilio};
use core_integrations::webhook::{apply_transition, resolve_twilio_call_uuid, WebhookEvent};
use serde::Deserialize;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/plivo/ring-url", post(plivo_ring))
        .route("/plivo/hangup-url", post(plivo_hangup))
        .route("/ip/xml-plivo", post(plivo_answer))
        .route("/twilio/status-callback", post(twilio_status_callback))
        .route("/twilio/twiml", post(twilio_twiml))
}

#[derive(Debug, Deserialize)]
struct PlivoRingBody {
    #[serde(rename = "CallUUID")]
    call_uuid: String,
}

async fn plivo_ring(State(state): State<Arc<AppState>>, Form(body): Form<PlivoRingBody>) -> impl IntoResponse {
    match apply_transition(&state.ledger, &body.call_uuid, WebhookEvent::Ring).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::error!(error = %e, call_uuid = body.call_uuid, "ring-url transition failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlivoHangupBody {
    #[serde(rename = "CallUUID")]
    call_uuid: String,
    #[serde(rename = "Duration")]
    duration: Option<i64>,
    #[serde(rename = "HangupCause")]
    hangup_cause: Option<String>,
}

async fn plivo_hangup(State(state): State<Arc<AppState>>, Form(body): Form<PlivoHangupBody>) -> impl IntoResponse {
    let event = WebhookEvent::Hangup { duration_secs: body.duration, hangup_cause: body.hangup_cause };
    match apply_transition(&state.ledger, &body.call_uuid, event).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::error!(error = %e, call_uuid = body.call_uuid, "hangup-url transition failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlivoAnswerBody {
    #[serde(rename = "CallUUID")]
    call_uuid: Option<String>,
}

/// Answer webhook (§4.4): applies the Answer transition if a `CallUUID`
/// arrived, then always returns the stream XML built from the query
/// parameters `answer_url` embedded at dispatch time.
async fn plivo_answer(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    Form(body): Form<PlivoAnswerBody>,
) -> Response {
    if let Some(call_uuid) = &body.call_uuid {
        if let Err(e) = apply_transition(&state.ledger, call_uuid, WebhookEvent::Answer).await {
            tracing::error!(error = %e, call_uuid, "answer transition failed");
        }
    }

    let xml = plivo::generate_answer_xml(&query);
    ([("content-type", "text/xml")], xml).into_response()
}

/// Twilio signs the full POST body (AccountSid, From, To, Direction,
/// ApiVersion, Timestamp, ... every field of the StatusCallbackEvent
/// payload, not just CallSid/CallStatus) — the whole field set has to go
/// into `verify_signature` or the computed HMAC never matches a genuine
/// request. Mirrors the teacher's `parse_form_data`-then-verify order in
/// `providers/twilio.rs` rather than destructuring into a narrow struct
/// up front.
async fn twilio_status_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(auth_token) = state.twilio_auth_token_lookup.system_default.clone() else {
        tracing::error!("twilio status-callback received but no twilio auth token is configured");
        return StatusCode::INTERNAL_SERVER_ERROR;
    };

    let signature = headers.get("X-Twilio-Signature").and_then(|v| v.to_str().ok()).unwrap_or_default();
    let url = format!("{}/twilio/status-callback", public_base_url());
    if !twilio::verify_signature(&url, &params, &auth_token, signature) {
        tracing::warn!(call_sid = ?params.get("CallSid"), "twilio signature verification failed");
        return StatusCode::UNAUTHORIZED;
    }

    let Some(call_sid) = params.get("CallSid").cloned() else {
        tracing::warn!("twilio status-callback missing CallSid");
        return StatusCode::BAD_REQUEST;
    };
    let Some(call_status) = params.get("CallStatus").cloned() else {
        tracing::warn!(call_sid, "twilio status-callback missing CallStatus");
        return StatusCode::BAD_REQUEST;
    };

    let call_uuid = match resolve_twilio_call_uuid(&state.ledger, &call_sid).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            tracing::warn!(call_sid, "status-callback for unrecognized CallSid ignored");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to resolve twilio call_uuid");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    match apply_transition(&state.ledger, &call_uuid, WebhookEvent::TwilioStatus { status: call_status }).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::error!(error = %e, call_uuid, "status-callback transition failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Standalone TwiML endpoint, built the same way `plivo_answer` is:
/// query parameters carry `wss` and flattened contact fields. Our own
/// outbound flow embeds TwiML inline at call placement (§4.4), so this
/// exists for a Twilio number configured to hit it directly rather than
/// through `client.calls.create`.
async fn twilio_twiml(Query(query): Query<HashMap<String, String>>) -> Response {
    let params = core_integrations::CallParams {
        client_id: uuid::Uuid::nil(),
        campaign_id: None,
        from_number: String::new(),
        to_number: String::new(),
        wss_url: query.get("wss").cloned().unwrap_or_default(),
        contact_data: flatten_to_json(&query),
        include_global_context: query.get("includeGlobalContext").map(|v| v == "true").unwrap_or(false),
        include_agent_context: query.get("includeAgentContext").map(|v| v == "true").unwrap_or(false),
    };

    let twiml = twilio::generate_twiml(&params);
    ([("content-type", "text/xml")], twiml).into_response()
}

fn flatten_to_json(query: &HashMap<String, String>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (k, v) in query {
        if k == "wss" || k == "clientId" || k == "campId" || k == "includeGlobalContext" || k == "includeAgentContext" {
            continue;
        }
        map.insert(k.clone(), serde_json::Value::String(v.clone()));
    }
    serde_json::Value::Object(map)
}

fn public_base_url() -> String {
    std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}
