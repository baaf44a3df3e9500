//! Campaign admin routes (§4.9): create, pause/resume, and inspect.
//! Dispatch itself happens out-of-process in `campaign-worker`; these
//! routes only flip `status` and read back the row.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use core_models::{Campaign, CampaignStatus, NewCampaign};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::client::ResolvedClient;
use crate::state::AppState;

/// Campaign creation needs an acting client (§6), resolved by the
/// caller through `resolve_client` before this router is merged in —
/// kept separate from `routes()` since read/pause/resume identify the
/// campaign by `:id` alone.
pub fn create_route() -> Router<Arc<AppState>> {
    Router::new().route("/campaigns", post(create_campaign))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/campaigns/:id", get(get_campaign))
        .route("/campaigns/:id/pause", post(pause_campaign))
        .route("/campaigns/:id/resume", post(resume_campaign))
}

#[derive(Debug, Deserialize)]
struct CreateCampaignBody {
    list_id: Uuid,
    from_number: String,
    wss_url: String,
    total_contacts: i64,
}

async fn create_campaign(
    State(state): State<Arc<AppState>>,
    axum::Extension(client): axum::Extension<ResolvedClient>,
    Json(body): Json<CreateCampaignBody>,
) -> Result<Json<Campaign>, ApiError> {
    let new_campaign = NewCampaign {
        client_id: client.id,
        list_id: body.list_id,
        from_number: body.from_number,
        wss_url: body.wss_url,
        total_contacts: body.total_contacts,
    };

    let campaign: Campaign = sqlx::query_as(
        r#"
        INSERT INTO campaigns (id, client_id, list_id, from_number, wss_url, status, current_index, total_contacts, processed_contacts, created_at)
        VALUES ($1, $2, $3, $4, $5, 'running', 0, $6, 0, NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new_campaign.client_id)
    .bind(new_campaign.list_id)
    .bind(&new_campaign.from_number)
    .bind(&new_campaign.wss_url)
    .bind(new_campaign.total_contacts)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(campaign))
}

async fn get_campaign(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<Campaign>, ApiError> {
    let campaign: Option<Campaign> = sqlx::query_as("SELECT * FROM campaigns WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;

    campaign.map(Json).ok_or_else(|| ApiError::NotFound(format!("campaign {} not found", id)))
}

/// §4.9: operator-initiated pause. Only flips `status` — it does not
/// touch `container_id`. A worker mid-dispatch owns the lease until it
/// next calls `advance_cursor`; if this route cleared `container_id`
/// out from under it, that CAS would fail and the contact it just
/// dispatched would never have its cursor advanced, so a later resume
/// would redispatch it (violates exactly-once-per-contact, P2). The
/// worker notices the flip itself on its next loop iteration and calls
/// its own CAS-scoped `mark_paused` (`campaign-worker::worker`), the
/// same way it does for a gate-exhaustion pause.
async fn pause_campaign(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<Campaign>, ApiError> {
    set_status(&state, id, CampaignStatus::Paused).await
}

/// §4.9: resume re-arms the campaign for the worker pool to claim again
/// from its persisted `current_index` — no replay of already-processed
/// contacts (C1/C2). `container_id` is left alone here too: a campaign
/// paused by the worker itself already carries `container_id = NULL`,
/// and one still winding down will release its own lease momentarily.
async fn resume_campaign(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<Campaign>, ApiError> {
    set_status(&state, id, CampaignStatus::Running).await
}

async fn set_status(state: &AppState, id: Uuid, status: CampaignStatus) -> Result<Json<Campaign>, ApiError> {
    let campaign: Option<Campaign> = sqlx::query_as("UPDATE campaigns SET status = $1 WHERE id = $2 RETURNING *")
        .bind(status)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;

    campaign.map(Json).ok_or_else(|| ApiError::NotFound(format!("campaign {} not found", id)))
}
