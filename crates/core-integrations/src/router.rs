//! Phone-Number → Provider Router (§4.5). Implements the
//! `core_dispatch::CallRouter` port so the dispatch core never depends on
//! `reqwest` or provider-specific types directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use core_dispatch::ledger::ActiveCallLedger;
use core_dispatch::router_port::{CallRouter, DispatchCallParams, RouterFailure, RouterFailureKind, RouterSuccess};
use core_models::{ClientCredentials, Provider};
use reqwest::Client;
use sqlx::PgPool;

use crate::adapter::{AdapterFailureKind, CallAdapter, CallParams};
use crate::credentials::{CredentialStore, SystemCredentials};
use crate::providers::plivo::PlivoAdapter;
use crate::providers::twilio::TwilioAdapter;

pub struct ProviderRouter {
    pool: PgPool,
    http: Client,
    ledger: Arc<ActiveCallLedger>,
    credentials: CredentialStore,
    system_credentials: SystemCredentials,
    base_url: String,
    adapter_timeout: Duration,
}

impl ProviderRouter {
    pub fn new(
        pool: PgPool,
        http: Client,
        ledger: Arc<ActiveCallLedger>,
        credentials: CredentialStore,
        system_credentials: SystemCredentials,
        base_url: String,
        adapter_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            http,
            ledger,
            credentials,
            system_credentials,
            base_url,
            adapter_timeout,
        }
    }

    /// §4.5 step 1: explicit override, else the phone-provider mapping,
    /// else default to Plivo.
    async fn resolve_provider(
        &self,
        from_number: &str,
        provider_override: Option<Provider>,
    ) -> Result<Provider, sqlx::Error> {
        if let Some(p) = provider_override {
            return Ok(p);
        }

        let row: Option<(Provider,)> =
            sqlx::query_as("SELECT provider FROM phone_provider_mappings WHERE phone_number = $1")
                .bind(from_number)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(p,)| p).unwrap_or(Provider::Plivo))
    }

    /// §4.5 steps 2-3: prefer client-specific credentials; fall back to
    /// system defaults if none exist, or if the client's credentials don't
    /// cover `from_number` (fail-safe ownership check).
    async fn resolve_credentials(
        &self,
        client_id: uuid::Uuid,
        provider: Provider,
        from_number: &str,
    ) -> Result<(ClientCredentials, bool), RouterFailure> {
        let client_specific = self.credentials.get(client_id, provider).await.map_err(|e| RouterFailure {
            kind: RouterFailureKind::ApiException,
            message: format!("credential lookup failed: {}", e),
            already_recorded: None,
        })?;

        if let Some(creds) = client_specific {
            if creds.owns_number(from_number) {
                return Ok((creds, true));
            }
            tracing::warn!(
                client_id = %client_id,
                from_number,
                "client credentials do not cover from_number, falling back to system credentials"
            );
        }

        match self.system_credentials.for_provider(provider) {
            Some(creds) => Ok((creds, false)),
            None => Err(RouterFailure {
                kind: RouterFailureKind::ApiException,
                message: format!("no credentials available for provider {:?}", provider),
                already_recorded: None,
            }),
        }
    }
}

fn mask_account_sid(sid: &str) -> String {
    if sid.len() <= 4 {
        "****".to_string()
    } else {
        format!("{}****{}", &sid[..2], &sid[sid.len() - 2..])
    }
}

#[async_trait]
impl CallRouter for ProviderRouter {
    async fn dispatch(&self, params: DispatchCallParams) -> Result<RouterSuccess, RouterFailure> {
        let provider = self
            .resolve_provider(&params.from_number, params.provider_override)
            .await
            .map_err(|e| RouterFailure {
                kind: RouterFailureKind::ApiException,
                message: format!("provider mapping lookup failed: {}", e),
                already_recorded: None,
            })?;

        let (credentials, is_client_specific) = self
            .resolve_credentials(params.client_id, provider, &params.from_number)
            .await?;

        let call_params = CallParams {
            client_id: params.client_id,
            campaign_id: params.campaign_id,
            from_number: params.from_number.clone(),
            to_number: params.to_number.clone(),
            wss_url: params.wss_url.clone(),
            contact_data: params.contact_data.clone(),
            include_global_context: params.include_global_context,
            include_agent_context: params.include_agent_context,
        };

        let adapter: Box<dyn CallAdapter> = match &credentials {
            ClientCredentials::Plivo(c) => {
                Box::new(PlivoAdapter::new(self.http.clone(), c.clone(), self.base_url.clone(), self.adapter_timeout))
            }
            ClientCredentials::Twilio(c) => Box::new(TwilioAdapter::new(
                self.http.clone(),
                c.clone(),
                self.base_url.clone(),
                self.adapter_timeout,
                self.ledger.clone(),
            )),
        };

        let masked_account_sid = match &credentials {
            ClientCredentials::Plivo(c) => mask_account_sid(&c.auth_id),
            ClientCredentials::Twilio(c) => mask_account_sid(&c.account_sid),
        };

        tracing::debug!(webhook_urls = ?adapter.webhook_urls(), "dispatching through adapter");
        let outcome = adapter.make_call(call_params).await;

        match outcome {
            Ok(success) => Ok(RouterSuccess {
                call_uuid: success.call_uuid,
                provider,
                is_client_specific,
                masked_account_sid,
            }),
            Err(failure) => {
                let kind = match failure.kind {
                    AdapterFailureKind::ApiCallFailed => RouterFailureKind::ApiCallFailed,
                    AdapterFailureKind::ApiException => RouterFailureKind::ApiException,
                };
                Err(RouterFailure {
                    kind,
                    message: failure.error,
                    already_recorded: failure.pre_reserved_call_uuid,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_preserves_length_hint_without_leaking_middle() {
        let masked = mask_account_sid("AC1234567890abcdef");
        assert!(masked.starts_with("AC"));
        assert!(masked.ends_with("ef"));
        assert!(!masked.contains("1234567890abcd"));
    }
}
