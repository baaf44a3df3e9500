//! Per-client encrypted credential storage plus system-default
//! fall-through (§4.5 step 2: "prefer client-specific credentials... else
//! system-default").

use core_models::client::{PlivoCredentials, TwilioCredentials};
use core_models::{ClientCredentials, Provider};
use sqlx::PgPool;
use uuid::Uuid;

use crate::encryption::{decrypt_json, encrypt_json};
use crate::error::IntegrationError;

/// System-wide default credentials, loaded once at startup from env vars
/// (§6: "Per-provider default credentials").
#[derive(Debug, Clone)]
pub struct SystemCredentials {
    pub plivo: Option<PlivoCredentials>,
    pub twilio: Option<TwilioCredentials>,
}

impl SystemCredentials {
    pub fn from_env() -> Self {
        let plivo = match (std::env::var("PLIVO_DEFAULT_AUTH_ID"), std::env::var("PLIVO_DEFAULT_AUTH_TOKEN")) {
            (Ok(auth_id), Ok(auth_token)) => Some(PlivoCredentials {
                auth_id,
                auth_token,
                validated_phone_numbers: vec![],
            }),
            _ => None,
        };

        let twilio = match (
            std::env::var("TWILIO_DEFAULT_ACCOUNT_SID"),
            std::env::var("TWILIO_DEFAULT_AUTH_TOKEN"),
        ) {
            (Ok(account_sid), Ok(auth_token)) => Some(TwilioCredentials {
                account_sid,
                auth_token,
                validated_phone_numbers: vec![],
            }),
            _ => None,
        };

        Self { plivo, twilio }
    }

    pub fn for_provider(&self, provider: Provider) -> Option<ClientCredentials> {
        match provider {
            Provider::Plivo => self.plivo.clone().map(ClientCredentials::Plivo),
            Provider::Twilio => self.twilio.clone().map(ClientCredentials::Twilio),
        }
    }
}

/// Encrypted-at-rest store for per-client, per-provider credentials.
pub struct CredentialStore {
    pool: PgPool,
    key: [u8; 32],
}

impl CredentialStore {
    pub fn new(pool: PgPool, key: [u8; 32]) -> Self {
        Self { pool, key }
    }

    pub async fn get(
        &self,
        client_id: Uuid,
        provider: Provider,
    ) -> Result<Option<ClientCredentials>, IntegrationError> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(
            r#"
            SELECT credentials_encrypted FROM client_credentials
            WHERE client_id = $1 AND provider = $2
            "#,
        )
        .bind(client_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((encrypted,)) => {
                let creds: ClientCredentials =
                    decrypt_json(&encrypted, &self.key).map_err(IntegrationError::Credential)?;
                Ok(Some(creds))
            }
            None => Ok(None),
        }
    }

    pub async fn upsert(&self, client_id: Uuid, credentials: ClientCredentials) -> Result<(), IntegrationError> {
        let provider = match &credentials {
            ClientCredentials::Plivo(_) => Provider::Plivo,
            ClientCredentials::Twilio(_) => Provider::Twilio,
        };
        let encrypted = encrypt_json(&credentials, &self.key).map_err(IntegrationError::Credential)?;

        sqlx::query(
            r#"
            INSERT INTO client_credentials (client_id, provider, credentials_encrypted, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (client_id, provider) DO UPDATE SET
                credentials_encrypted = EXCLUDED.credentials_encrypted,
                updated_at = NOW()
            "#,
        )
        .bind(client_id)
        .bind(provider)
        .bind(&encrypted)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
