//! Application state

use std::sync::Arc;

use core_dispatch::ledger::ActiveCallLedger;
use core_integrations::{CredentialStore, SystemCredentials};
use sqlx::PgPool;

pub struct AppState {
    pub pool: PgPool,
    pub ledger: Arc<ActiveCallLedger>,
    pub credentials: Arc<CredentialStore>,
    pub system_credentials: SystemCredentials,
    pub twilio_auth_token_lookup: TwilioAuthTokenLookup,
}

/// Twilio status-callback signature verification (§4.7) needs the
/// account's auth token; this resolves it client-by-client with a
/// system-default fallback, mirroring `ProviderRouter::resolve_credentials`.
#[derive(Clone)]
pub struct TwilioAuthTokenLookup {
    pub system_default: Option<String>,
}

impl AppState {
    pub fn new(pool: PgPool, encryption_key: [u8; 32]) -> Self {
        let system_credentials = SystemCredentials::from_env();
        let twilio_auth_token_lookup = TwilioAuthTokenLookup {
            system_default: system_credentials.twilio.as_ref().map(|c| c.auth_token.clone()),
        };

        Self {
            ledger: Arc::new(ActiveCallLedger::new(pool.clone())),
            credentials: Arc::new(CredentialStore::new(pool.clone(), encryption_key)),
            system_credentials,
            twilio_auth_token_lookup,
            pool,
        }
    }
}
