//! Phone-Number → Provider Mapping (§3 `Phone-Provider Mapping`, §4.5
//! step 1). Absence of an entry implies the default provider.

use serde::{Deserialize, Serialize};

use crate::provider::Provider;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PhoneProviderMapping {
    pub phone_number: String,
    pub provider: Provider,
    pub provider_config: serde_json::Value,
}
