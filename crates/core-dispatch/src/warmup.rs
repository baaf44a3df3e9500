//! Bot Warmup Client (§4.3): a best-effort pre-flight probe against the
//! downstream speech bot before a call is placed.

use std::time::{Duration, Instant};

use core_models::validation::derive_warmup_url;
use reqwest::Client;

#[derive(Debug, Clone)]
pub struct WarmupOutcome {
    pub success: bool,
    pub attempts: u32,
    pub duration: Duration,
    pub error: Option<String>,
}

pub struct BotWarmupClient {
    http: Client,
    enabled: bool,
    max_attempts: u32,
    per_attempt_timeout: Duration,
}

impl BotWarmupClient {
    pub fn new(enabled: bool, max_attempts: u32, per_attempt_timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            enabled,
            max_attempts,
            per_attempt_timeout,
        }
    }

    /// Warm up the bot at the host carried in `wss_url`. URL-derivation
    /// failure and a globally-disabled warmup are both treated as success
    /// with zero attempts — warmup is advisory, not a hard dependency.
    pub async fn warm_up(&self, wss_url: &str) -> WarmupOutcome {
        let started = Instant::now();

        if !self.enabled {
            return WarmupOutcome {
                success: true,
                attempts: 0,
                duration: started.elapsed(),
                error: None,
            };
        }

        let Some(warmup_url) = derive_warmup_url(wss_url) else {
            tracing::debug!(wss_url, "warmup skipped: could not derive warmup URL");
            return WarmupOutcome {
                success: true,
                attempts: 0,
                duration: started.elapsed(),
                error: None,
            };
        };

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            match self
                .http
                .post(&warmup_url)
                .timeout(self.per_attempt_timeout)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    return WarmupOutcome {
                        success: true,
                        attempts: attempt,
                        duration: started.elapsed(),
                        error: None,
                    };
                }
                Ok(resp) => {
                    last_error = Some(format!("warmup returned HTTP {}", resp.status()));
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                }
            }

            tracing::warn!(
                warmup_url,
                attempt,
                max_attempts = self.max_attempts,
                "bot warmup attempt failed"
            );
        }

        WarmupOutcome {
            success: false,
            attempts: self.max_attempts,
            duration: started.elapsed(),
            error: last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_warmup_succeeds_with_zero_attempts() {
        let client = BotWarmupClient::new(false, 3, Duration::from_secs(1));
        let outcome = client.warm_up("wss://bot.example.com/media").await;
        assert!(outcome.success);
        assert_eq!(outcome.attempts, 0);
    }

    #[tokio::test]
    async fn undeterminable_url_skips_warmup_as_success() {
        let client = BotWarmupClient::new(true, 3, Duration::from_secs(1));
        let outcome = client.warm_up("not-a-wss-url").await;
        assert!(outcome.success);
        assert_eq!(outcome.attempts, 0);
    }
}
