//! Orphan Detector (§4.10): periodically reclaims campaigns whose owning
//! worker stopped heartbeating. `current_index` is left untouched — the
//! next claimant resumes from the persisted cursor, and since the cursor
//! only advances after a ledger row is written, no contact is replayed.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::error::WorkerError;

pub struct OrphanDetector {
    pool: PgPool,
    threshold: Duration,
    scan_interval: Duration,
}

impl OrphanDetector {
    pub fn new(pool: PgPool, threshold: Duration, scan_interval: Duration) -> Self {
        Self { pool, threshold, scan_interval }
    }

    /// One scan pass. Returns the number of campaigns reclaimed.
    pub async fn scan(&self) -> Result<u64, WorkerError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET container_id = NULL
            WHERE status = 'running'
              AND container_id IS NOT NULL
              AND heartbeat < NOW() - make_interval(secs => $1)
            "#,
        )
        .bind(self.threshold.as_secs() as f64)
        .execute(&self.pool)
        .await?;

        let reclaimed = result.rows_affected();
        if reclaimed > 0 {
            tracing::info!(reclaimed, "orphan detector cleared stale campaign leases");
        }
        Ok(reclaimed)
    }

    pub fn spawn_periodic(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.scan_interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.scan().await {
                    tracing::error!(error = %e, "orphan scan failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_models::CampaignStatus;
    use uuid::Uuid;

    fn pool_url() -> Option<String> {
        std::env::var("DATABASE_URL").ok()
    }

    /// §8 scenario 4: a stale running campaign's lease is cleared, cursor
    /// untouched. Exercised only against a real database.
    #[tokio::test]
    async fn stale_lease_is_cleared_cursor_preserved() {
        let Some(url) = pool_url() else {
            eprintln!("skipping: DATABASE_URL not set");
            return;
        };
        let pool = PgPool::connect(&url).await.unwrap();

        let client_id = Uuid::new_v4();
        sqlx::query("INSERT INTO clients (id, display_name, is_active) VALUES ($1, 'test', true)")
            .bind(client_id)
            .execute(&pool)
            .await
            .unwrap();

        let campaign_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO campaigns (id, client_id, list_id, from_number, wss_url, status, current_index, total_contacts, processed_contacts, container_id, heartbeat)
            VALUES ($1, $2, $3, '+15550000000', 'wss://bot.example.com/media', 'running', 40, 100, 40, 'dead-worker', NOW() - interval '3 minutes')
            "#,
        )
        .bind(campaign_id)
        .bind(client_id)
        .bind(Uuid::new_v4())
        .execute(&pool)
        .await
        .unwrap();

        let detector = OrphanDetector::new(pool.clone(), Duration::from_secs(120), Duration::from_secs(30));
        let reclaimed = detector.scan().await.unwrap();
        assert_eq!(reclaimed, 1);

        let row: (Option<String>, i64, String) =
            sqlx::query_as("SELECT container_id, current_index, status FROM campaigns WHERE id = $1")
                .bind(campaign_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(row.0, None);
        assert_eq!(row.1, 40);
        assert_eq!(row.2, CampaignStatus::Running.as_str());
    }
}
