//! The Client row and its per-provider credentials (§3 `Client`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub id: Uuid,
    pub display_name: String,
    pub is_active: bool,
    /// `None` means the configured `DEFAULT_CLIENT_MAX_CONCURRENT_CALLS`
    /// applies (§6).
    pub max_concurrent_calls: Option<i32>,
}

/// Plivo credentials scoped to one client. `validated_phone_numbers` is
/// the fail-safe ownership list consulted by the router (§4.5 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlivoCredentials {
    pub auth_id: String,
    pub auth_token: String,
    pub validated_phone_numbers: Vec<String>,
}

/// Twilio credentials scoped to one client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub validated_phone_numbers: Vec<String>,
}

/// Per-client, per-provider credential set as stored (encrypted) in
/// `core_integrations`. Kept here because both the router and the API
/// layer need the shape without depending on the encryption machinery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ClientCredentials {
    Plivo(PlivoCredentials),
    Twilio(TwilioCredentials),
}

impl ClientCredentials {
    /// Whether `from_number` is in this credential's validated-ownership
    /// list. An empty list means ownership was never validated, which the
    /// router treats the same as "not validated" (fail closed).
    pub fn owns_number(&self, from_number: &str) -> bool {
        let list = match self {
            ClientCredentials::Plivo(c) => &c.validated_phone_numbers,
            ClientCredentials::Twilio(c) => &c.validated_phone_numbers,
        };
        list.iter().any(|n| n == from_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_check_is_exact_match() {
        let creds = ClientCredentials::Twilio(TwilioCredentials {
            account_sid: "AC1".into(),
            auth_token: "secret".into(),
            validated_phone_numbers: vec!["+15551234567".into()],
        });
        assert!(creds.owns_number("+15551234567"));
        assert!(!creds.owns_number("+15559999999"));
    }

    #[test]
    fn empty_validated_list_owns_nothing() {
        let creds = ClientCredentials::Plivo(PlivoCredentials {
            auth_id: "MAXXXXXXXXXXXXXXXXXX".into(),
            auth_token: "secret".into(),
            validated_phone_numbers: vec![],
        });
        assert!(!creds.owns_number("+15551234567"));
    }
}
