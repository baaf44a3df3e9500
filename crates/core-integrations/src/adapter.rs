//! Provider Adapters (§4.4): one trait, stateless implementations. Adding a
//! new provider means implementing this trait plus a status-code mapping
//! in `status_map.rs` — no change to the router or pipeline.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CallParams {
    pub client_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub from_number: String,
    pub to_number: String,
    pub wss_url: String,
    pub contact_data: Value,
    pub include_global_context: bool,
    pub include_agent_context: bool,
}

#[derive(Debug, Clone)]
pub struct AdapterSuccess {
    pub call_uuid: String,
    /// Raw provider response, kept for troubleshooting — never logged with
    /// credentials embedded.
    pub provider_response: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterFailureKind {
    /// The provider's API responded with an error status.
    ApiCallFailed,
    /// Transport-level failure: timeout, connection refused, DNS failure.
    ApiException,
}

#[derive(Debug, Clone)]
pub struct AdapterFailure {
    pub kind: AdapterFailureKind,
    pub error: String,
    pub error_details: Option<Value>,
    /// Set when the adapter had already written a ledger row before the
    /// failure occurred (Twilio's pre-reservation, §4.4/§9) — callers must
    /// not record a second row for the same contact.
    pub pre_reserved_call_uuid: Option<String>,
}

/// §4.4/§9's three-method adapter surface: `makeCall`, `validateConfig`,
/// `getWebhookUrls`. A new provider is added entirely behind this trait —
/// the router and pipeline never see provider-specific types.
#[async_trait]
pub trait CallAdapter: Send + Sync {
    /// `makeCall(callParams, credentials)`. All adapter failures are
    /// terminal for that contact — there is no recoverable-retry path
    /// inside the adapter itself.
    async fn make_call(&self, params: CallParams) -> Result<AdapterSuccess, AdapterFailure>;

    /// `validateConfig()`: cheap, local checks on the credentials this
    /// adapter was constructed with (format, required fields) — no network
    /// call. Callers run this before `make_call` to fail fast on
    /// misconfigured credentials rather than spending an API round trip.
    fn validate_config(&self) -> Result<(), String>;

    /// `getWebhookUrls()`: the fixed callback endpoints this adapter
    /// registers with the provider at call placement, independent of any
    /// particular call's params (Plivo's `answer_url` is per-call — it
    /// depends on contact data flattened into query params — so it isn't
    /// part of this fixed set).
    fn webhook_urls(&self) -> Vec<String>;
}
