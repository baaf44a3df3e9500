//! Backend API server: webhook ingress plus campaign/client admin
//! routes (§6).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Json, Router};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod middleware;
mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "backend_api=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env();

    let pool = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
    tracing::info!("connected to database");

    let encryption_key = core_integrations::encryption::load_key_from_env()
        .map_err(|e| anyhow::anyhow!("refusing to start without a valid encryption key: {}", e))?;

    let state = Arc::new(AppState::new(pool, encryption_key));

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(routes::webhooks::routes())
        .nest("/api/v1", routes::api_routes(state.clone()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
