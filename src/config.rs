//! Environment-tunable pipeline settings.
//!
//! Every knob has a compiled-in default; unparseable values fall back to
//! the default rather than failing startup.

use std::str::FromStr;
use std::time::Duration;

pub const ENV_FETCH_RETRIES: &str = "NEWS_FETCH_RETRIES";
pub const ENV_FETCH_TIMEOUT_MS: &str = "NEWS_FETCH_TIMEOUT_MS";
pub const ENV_FETCH_BACKOFF_MS: &str = "NEWS_FETCH_BACKOFF_MS";
pub const ENV_BATCH_DEADLINE_MS: &str = "NEWS_BATCH_DEADLINE_MS";
pub const ENV_PER_SOURCE_CAP: &str = "NEWS_PER_SOURCE_CAP";
pub const ENV_BATCH_CAP: &str = "NEWS_BATCH_CAP";
pub const ENV_FAST_CAP: &str = "NEWS_FAST_CAP";
pub const ENV_SOFT_TTL_MS: &str = "NEWS_CACHE_SOFT_TTL_MS";
pub const ENV_HARD_TTL_MS: &str = "NEWS_CACHE_HARD_TTL_MS";

pub const DEFAULT_FETCH_RETRIES: u32 = 2;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_FETCH_BACKOFF_MS: u64 = 250;
pub const DEFAULT_BATCH_DEADLINE_MS: u64 = 8_000;
pub const DEFAULT_PER_SOURCE_CAP: usize = 12;
pub const DEFAULT_BATCH_CAP: usize = 60;
pub const DEFAULT_FAST_CAP: usize = 24;
pub const DEFAULT_SOFT_TTL_MS: u64 = 60_000;
pub const DEFAULT_HARD_TTL_MS: u64 = 600_000;

/// Tuning knobs for one pipeline instance. Immutable after startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Retries after the first attempt; total attempts = retries + 1.
    pub fetch_retries: u32,
    /// Budget for one download+parse attempt.
    pub fetch_timeout: Duration,
    /// Linear backoff base; attempt n waits base * n.
    pub fetch_backoff: Duration,
    /// Whole-batch deadline; stragglers are abandoned past it.
    pub batch_deadline: Duration,
    pub per_source_cap: usize,
    pub batch_cap: usize,
    /// Prefix length served by the fast variant.
    pub fast_cap: usize,
    pub soft_ttl_ms: u64,
    pub hard_ttl_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_retries: DEFAULT_FETCH_RETRIES,
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            fetch_backoff: Duration::from_millis(DEFAULT_FETCH_BACKOFF_MS),
            batch_deadline: Duration::from_millis(DEFAULT_BATCH_DEADLINE_MS),
            per_source_cap: DEFAULT_PER_SOURCE_CAP,
            batch_cap: DEFAULT_BATCH_CAP,
            fast_cap: DEFAULT_FAST_CAP,
            soft_ttl_ms: DEFAULT_SOFT_TTL_MS,
            hard_ttl_ms: DEFAULT_HARD_TTL_MS,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let soft_ttl_ms = env_parse(ENV_SOFT_TTL_MS, DEFAULT_SOFT_TTL_MS);
        // Hard TTL below soft TTL would make every stale window a miss.
        let hard_ttl_ms: u64 = env_parse(ENV_HARD_TTL_MS, DEFAULT_HARD_TTL_MS);
        Self {
            fetch_retries: env_parse(ENV_FETCH_RETRIES, DEFAULT_FETCH_RETRIES),
            fetch_timeout: Duration::from_millis(env_parse(
                ENV_FETCH_TIMEOUT_MS,
                DEFAULT_FETCH_TIMEOUT_MS,
            )),
            fetch_backoff: Duration::from_millis(env_parse(
                ENV_FETCH_BACKOFF_MS,
                DEFAULT_FETCH_BACKOFF_MS,
            )),
            batch_deadline: Duration::from_millis(env_parse(
                ENV_BATCH_DEADLINE_MS,
                DEFAULT_BATCH_DEADLINE_MS,
            )),
            per_source_cap: env_parse(ENV_PER_SOURCE_CAP, DEFAULT_PER_SOURCE_CAP),
            batch_cap: env_parse(ENV_BATCH_CAP, DEFAULT_BATCH_CAP),
            fast_cap: env_parse(ENV_FAST_CAP, DEFAULT_FAST_CAP),
            soft_ttl_ms,
            hard_ttl_ms: hard_ttl_ms.max(soft_ttl_ms),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            ENV_FETCH_RETRIES,
            ENV_FETCH_TIMEOUT_MS,
            ENV_FETCH_BACKOFF_MS,
            ENV_BATCH_DEADLINE_MS,
            ENV_PER_SOURCE_CAP,
            ENV_BATCH_CAP,
            ENV_FAST_CAP,
            ENV_SOFT_TTL_MS,
            ENV_HARD_TTL_MS,
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn defaults_without_env() {
        clear_env();
        let cfg = PipelineConfig::from_env();
        assert_eq!(cfg.fetch_retries, DEFAULT_FETCH_RETRIES);
        assert_eq!(cfg.fetch_timeout.as_millis() as u64, DEFAULT_FETCH_TIMEOUT_MS);
        assert_eq!(cfg.batch_cap, DEFAULT_BATCH_CAP);
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        clear_env();
        std::env::set_var(ENV_FETCH_RETRIES, "5");
        std::env::set_var(ENV_BATCH_DEADLINE_MS, "1234");
        let cfg = PipelineConfig::from_env();
        assert_eq!(cfg.fetch_retries, 5);
        assert_eq!(cfg.batch_deadline.as_millis(), 1234);
        clear_env();
    }

    #[test]
    #[serial]
    fn garbage_values_fall_back_to_defaults() {
        clear_env();
        std::env::set_var(ENV_PER_SOURCE_CAP, "not-a-number");
        let cfg = PipelineConfig::from_env();
        assert_eq!(cfg.per_source_cap, DEFAULT_PER_SOURCE_CAP);
        clear_env();
    }

    #[test]
    #[serial]
    fn hard_ttl_never_undercuts_soft_ttl() {
        clear_env();
        std::env::set_var(ENV_SOFT_TTL_MS, "90000");
        std::env::set_var(ENV_HARD_TTL_MS, "1000");
        let cfg = PipelineConfig::from_env();
        assert_eq!(cfg.soft_ttl_ms, 90_000);
        assert_eq!(cfg.hard_ttl_ms, 90_000);
        clear_env();
    }
}
