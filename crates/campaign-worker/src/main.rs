//! Campaign Worker process (§4.9/§4.10): claims campaigns, drives them
//! through the Call Pipeline, and runs the periodic sweeper and orphan
//! detector tasks alongside.

use std::sync::Arc;

use campaign_worker::{CampaignWorker, OrphanDetector, PostgresContactListSource, WorkerConfig};
use core_dispatch::{ActiveCallLedger, BotWarmupClient, CallPipeline, ConcurrencyGate, TimeoutSweeper};
use core_integrations::{CredentialStore, ProviderRouter, SystemCredentials};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "campaign_worker=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!("starting campaign worker");

    let pool = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
    tracing::info!("connected to database");

    let encryption_key = core_integrations::encryption::load_key_from_env()
        .map_err(|e| anyhow::anyhow!("refusing to start without a valid encryption key: {}", e))?;

    let ledger = Arc::new(ActiveCallLedger::new(pool.clone()));
    let gate = Arc::new(ConcurrencyGate::new(ledger.clone(), config.dispatch.clone()));
    let warmup = Arc::new(BotWarmupClient::new(
        config.dispatch.bot_warmup_enabled,
        config.dispatch.warmup_attempts,
        config.dispatch.warmup_timeout,
    ));
    let sweeper = Arc::new(TimeoutSweeper::new(ledger.clone(), config.dispatch.clone()));

    let base_url = std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let router = Arc::new(ProviderRouter::new(
        pool.clone(),
        reqwest::Client::new(),
        ledger.clone(),
        CredentialStore::new(pool.clone(), encryption_key),
        SystemCredentials::from_env(),
        base_url,
        config.dispatch.adapter_timeout,
    ));

    let pipeline = Arc::new(CallPipeline::new(ledger.clone(), sweeper.clone(), gate, warmup, router));
    let contacts = Arc::new(PostgresContactListSource::new(pool.clone()));

    sweeper.spawn_periodic();
    Arc::new(OrphanDetector::new(pool.clone(), config.orphan_threshold, config.orphan_scan_interval)).spawn_periodic();

    let container_id = format!("{}-{}", hostname(), std::process::id());
    tracing::info!(container_id, max_concurrent_campaigns = config.max_concurrent_campaigns, "spawning worker tasks");

    let mut handles = Vec::new();
    for i in 0..config.max_concurrent_campaigns {
        let worker = Arc::new(CampaignWorker::new(
            pool.clone(),
            pipeline.clone(),
            contacts.clone(),
            config.clone(),
            format!("{}-{}", container_id, i),
        ));
        handles.push(tokio::spawn(worker.run_forever()));
    }

    for handle in handles {
        handle.await?;
    }

    Ok(())
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "campaign-worker".to_string())
}
