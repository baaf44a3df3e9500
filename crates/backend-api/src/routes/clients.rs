//! Client admin routes: registration and per-provider credential
//! upload. Credentials are accepted in plaintext over the request body
//! and immediately encrypted at rest via `core_integrations::encryption`
//! (§4.5) — never logged, never returned.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use core_models::{Client, ClientCredentials};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/clients", post(create_client))
        .route("/clients/:id", get(get_client))
        .route("/clients/:id/credentials", post(upsert_credentials))
}

#[derive(Debug, Deserialize)]
struct CreateClientBody {
    display_name: String,
    max_concurrent_calls: Option<i32>,
}

async fn create_client(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateClientBody>,
) -> Result<Json<Client>, ApiError> {
    let client: Client = sqlx::query_as(
        "INSERT INTO clients (id, display_name, is_active, max_concurrent_calls) VALUES ($1, $2, true, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(body.display_name)
    .bind(body.max_concurrent_calls)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(client))
}

async fn get_client(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<Client>, ApiError> {
    let client: Option<Client> = sqlx::query_as("SELECT * FROM clients WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;

    client.map(Json).ok_or_else(|| ApiError::NotFound(format!("client {} not found", id)))
}

async fn upsert_credentials(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ClientCredentials>,
) -> Result<axum::http::StatusCode, ApiError> {
    state.credentials.upsert(id, body).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
