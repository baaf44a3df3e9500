//! Client resolution middleware for the `/api/v1` admin surface.
//!
//! Resolves the acting client from an `X-Client-Id` header or a
//! `client_id` query parameter and stores the looked-up row in the
//! request extensions. There is no authentication layer in this crate
//! (out of scope, see `spec.md` Non-goals) — this only resolves which
//! client a request is acting as, the way `resolve_tenant` resolved a
//! tenant in the teacher.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClientQuery {
    pub client_id: Option<Uuid>,
}

/// Resolved and looked-up client, inserted into request extensions on
/// success so route handlers can pull it out without a second query.
pub type ResolvedClient = core_models::Client;

pub async fn resolve_client(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClientQuery>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let header_id = request
        .headers()
        .get("X-Client-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok());

    let Some(client_id) = header_id.or(query.client_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "missing X-Client-Id header or client_id query parameter" })),
        )
            .into_response();
    };

    let row: Result<Option<core_models::Client>, sqlx::Error> =
        sqlx::query_as("SELECT id, display_name, is_active, max_concurrent_calls FROM clients WHERE id = $1")
            .bind(client_id)
            .fetch_optional(&state.pool)
            .await;

    match row {
        Ok(Some(client)) if client.is_active => {
            request.extensions_mut().insert(client);
            next.run(request).await
        }
        Ok(Some(_)) => (StatusCode::FORBIDDEN, Json(serde_json::json!({ "error": "client is not active" }))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "client not found", "client_id": client_id })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "database error resolving client");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": "failed to resolve client" }))).into_response()
        }
    }
}
