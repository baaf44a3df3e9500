//! The port the Call Pipeline dispatches through. `core-dispatch` defines
//! the interface; `core-integrations` supplies the concrete
//! Phone-Number → Provider Router (§4.5) and adapters (§4.4) so this
//! crate never depends on `reqwest`-level provider details (§9: "Provider
//! adapters are stateless modules behind one trait").

use async_trait::async_trait;
use core_models::Provider;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DispatchCallParams {
    pub client_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub from_number: String,
    pub to_number: String,
    pub wss_url: String,
    pub contact_data: Value,
    pub include_global_context: bool,
    pub include_agent_context: bool,
    pub contact_index: i64,
    pub sequence_number: i64,
    /// Explicit provider override from the campaign/contact row (§4.5
    /// step 1). `None` falls through to the phone-provider mapping.
    pub provider_override: Option<Provider>,
}

#[derive(Debug, Clone)]
pub struct RouterSuccess {
    pub call_uuid: String,
    pub provider: Provider,
    pub is_client_specific: bool,
    /// Never the raw secret — always masked before it leaves the router
    /// (§4.5 step 5).
    pub masked_account_sid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterFailureKind {
    /// The provider's API responded with an error (§4.4, §7).
    ApiCallFailed,
    /// Transport-level failure: timeout, connection refused (§4.4, §7).
    ApiException,
}

#[derive(Debug, Clone)]
pub struct RouterFailure {
    pub kind: RouterFailureKind,
    pub message: String,
    /// Set when a ledger row for this attempt was already written before
    /// the failure was known (Twilio's pre-reservation, §4.4) — the
    /// pipeline must not synthesize a second row for the same contact.
    pub already_recorded: Option<String>,
}

/// Port implemented by `core_integrations::router::ProviderRouter`.
#[async_trait]
pub trait CallRouter: Send + Sync {
    async fn dispatch(&self, params: DispatchCallParams) -> Result<RouterSuccess, RouterFailure>;
}
