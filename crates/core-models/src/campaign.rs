//! The Campaign row (§3 `Campaign`, §4.9, §4.10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::CampaignStatus;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Campaign {
    pub id: Uuid,
    pub client_id: Uuid,
    pub list_id: Uuid,
    pub from_number: String,
    pub wss_url: String,
    pub status: CampaignStatus,
    /// Next unprocessed contact index — the resume cursor (C1: `0 <=
    /// current_index <= total_contacts`).
    pub current_index: i64,
    pub total_contacts: i64,
    pub processed_contacts: i64,
    pub heartbeat: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    /// Opaque identity of the worker currently holding the campaign's
    /// claim lease (C2). `None` means unclaimed.
    pub container_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    pub fn is_complete(&self) -> bool {
        self.current_index >= self.total_contacts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
    pub client_id: Uuid,
    pub list_id: Uuid,
    pub from_number: String,
    pub wss_url: String,
    pub total_contacts: i64,
}
