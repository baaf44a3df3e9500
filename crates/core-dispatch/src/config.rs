//! Dispatch-core configuration (§6 environment variables).

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub global_max_calls: i64,
    pub default_client_max_concurrent_calls: i32,

    pub max_processed_time: Duration,
    pub max_ringing_time: Duration,
    pub max_ongoing_time: Duration,
    pub cleanup_interval: Duration,

    pub bot_warmup_enabled: bool,
    pub warmup_attempts: u32,
    pub warmup_timeout: Duration,

    /// Gate `waitForSlot` polling interval — fixed at 2s per §4.2, not
    /// meant to be tuned per deployment, but kept configurable for tests.
    pub gate_poll_interval: Duration,
    /// Hard ceiling on poll attempts (~33 min at the default interval).
    pub gate_max_attempts: u32,

    pub adapter_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            global_max_calls: 50,
            default_client_max_concurrent_calls: 10,
            max_processed_time: Duration::from_millis(300_000),
            max_ringing_time: Duration::from_millis(180_000),
            max_ongoing_time: Duration::from_millis(3_600_000),
            cleanup_interval: Duration::from_millis(300_000),
            bot_warmup_enabled: true,
            warmup_attempts: 3,
            warmup_timeout: Duration::from_millis(5_000),
            gate_poll_interval: Duration::from_secs(2),
            gate_max_attempts: 1000,
            adapter_timeout: Duration::from_secs(30),
        }
    }
}

impl DispatchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            global_max_calls: env_i64("GLOBAL_MAX_CALLS")
                .or_else(|| env_i64("GLOBAL_MAX_CONCURRENT_CALLS"))
                .unwrap_or(defaults.global_max_calls),
            default_client_max_concurrent_calls: env_parse("DEFAULT_CLIENT_MAX_CONCURRENT_CALLS")
                .unwrap_or(defaults.default_client_max_concurrent_calls),
            max_processed_time: env_millis("MAX_PROCESSED_TIME").unwrap_or(defaults.max_processed_time),
            max_ringing_time: env_millis("MAX_RINGING_TIME").unwrap_or(defaults.max_ringing_time),
            max_ongoing_time: env_millis("MAX_ONGOING_TIME").unwrap_or(defaults.max_ongoing_time),
            cleanup_interval: env_millis("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            bot_warmup_enabled: env::var("BOT_WARMUP_ENABLED")
                .ok()
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.bot_warmup_enabled),
            warmup_attempts: env_parse("WARMUP_ATTEMPTS").unwrap_or(defaults.warmup_attempts),
            warmup_timeout: env_millis("WARMUP_TIMEOUT_MS").unwrap_or(defaults.warmup_timeout),
            gate_poll_interval: defaults.gate_poll_interval,
            gate_max_attempts: defaults.gate_max_attempts,
            adapter_timeout: defaults.adapter_timeout,
        }
    }
}

fn env_i64(key: &str) -> Option<i64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_i64(key).map(|ms| Duration::from_millis(ms.max(0) as u64))
}
