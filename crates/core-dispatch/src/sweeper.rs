//! Lazy Timeout Sweeper (§4.8). Invoked inline before every dispatch
//! ("lazy" — correctness of concurrency counts never depends on a
//! background timer being alive) and on a periodic interval.

use std::sync::Arc;

use chrono::Utc;
use core_models::FailureReason;

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::ledger::ActiveCallLedger;

pub struct TimeoutSweeper {
    ledger: Arc<ActiveCallLedger>,
    config: DispatchConfig,
}

impl TimeoutSweeper {
    pub fn new(ledger: Arc<ActiveCallLedger>, config: DispatchConfig) -> Self {
        Self { ledger, config }
    }

    /// Run one sweep pass, expiring rows that have outlived their
    /// per-status threshold. Returns the number of rows expired.
    pub async fn sweep(&self) -> Result<u64, DispatchError> {
        let now = Utc::now();
        let expired = self
            .ledger
            .bulk_expire(
                now,
                self.config.max_processed_time.as_secs() as i64,
                self.config.max_ringing_time.as_secs() as i64,
                self.config.max_ongoing_time.as_secs() as i64,
                FailureReason::WebhookTimeout,
            )
            .await?;

        if expired > 0 {
            tracing::info!(expired, "sweeper expired stuck calls");
        }

        Ok(expired)
    }

    /// Spawn the periodic sweeper task (§4.8: "on a periodic timer (every
    /// 5 min by default)"). Intended to run alongside, not instead of,
    /// the inline lazy sweep in the Call Pipeline.
    pub fn spawn_periodic(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = self.config.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep().await {
                    tracing::error!(error = %e, "periodic sweep failed");
                }
            }
        })
    }

    /// One-time cleanup variant used by an operator-triggered maintenance
    /// pass rather than the regular lifecycle sweep (§4.8).
    pub async fn one_time_cleanup(&self, max_age_secs: i64) -> Result<u64, DispatchError> {
        self.ledger.one_time_cleanup(Utc::now(), max_age_secs).await
    }
}
