//! Runtime configuration
//!
//! [`LedgerConfig`] bounds how long a write may wait for a contended account
//! and how conflicts are retried. [`ReplayConfig`] sizes the CSV replay.
//! Both fall back to their defaults, with a warning, when given zero values.

use std::time::Duration;

use tracing::warn;

const ENV_LOCK_TIMEOUT_MS: &str = "LEDGER_LOCK_TIMEOUT_MS";
const ENV_MAX_RETRIES: &str = "LEDGER_MAX_RETRIES";
const ENV_RETRY_BACKOFF_MS: &str = "LEDGER_RETRY_BACKOFF_MS";

/// Contention handling for ledger writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Longest wait for an account's writer lock per attempt
    pub lock_timeout: Duration,
    /// Retries after the first attempt before surfacing `Conflict`
    pub max_retries: u32,
    /// Backoff before the first retry; doubled on each further retry
    pub retry_backoff: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_backoff: Duration::from_millis(20),
        }
    }
}

impl LedgerConfig {
    /// Create a LedgerConfig with custom values
    ///
    /// A zero lock timeout or backoff would turn every contended write into an
    /// immediate failure, so those fall back to the defaults. Zero retries is
    /// allowed.
    pub fn new(lock_timeout: Duration, max_retries: u32, retry_backoff: Duration) -> Self {
        let default = Self::default();

        let lock_timeout = if lock_timeout.is_zero() {
            warn!(
                default_ms = default.lock_timeout.as_millis() as u64,
                "Invalid lock_timeout (0), using default"
            );
            default.lock_timeout
        } else {
            lock_timeout
        };

        let retry_backoff = if retry_backoff.is_zero() {
            warn!(
                default_ms = default.retry_backoff.as_millis() as u64,
                "Invalid retry_backoff (0), using default"
            );
            default.retry_backoff
        } else {
            retry_backoff
        };

        Self {
            lock_timeout,
            max_retries,
            retry_backoff,
        }
    }

    /// Read overrides from `LEDGER_*` environment variables
    ///
    /// Unset or unparsable variables keep their default.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self::new(
            env_u64(ENV_LOCK_TIMEOUT_MS)
                .map(Duration::from_millis)
                .unwrap_or(default.lock_timeout),
            env_u64(ENV_MAX_RETRIES)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(default.max_retries),
            env_u64(ENV_RETRY_BACKOFF_MS)
                .map(Duration::from_millis)
                .unwrap_or(default.retry_backoff),
        )
    }

    /// Backoff before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.retry_backoff.saturating_mul(factor)
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring unparsable setting");
            None
        }
    }
}

/// Sizing for the CSV replay
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Number of rows read per batch
    pub batch_size: usize,
    /// Maximum number of rows applied concurrently
    pub max_concurrent: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent: num_cpus::get(),
        }
    }
}

impl ReplayConfig {
    /// Create a ReplayConfig with custom values
    pub fn new(batch_size: usize, max_concurrent: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "Invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent = if max_concurrent == 0 {
            warn!(
                max_concurrent,
                default = default.max_concurrent,
                "Invalid max_concurrent, using default"
            );
            default.max_concurrent
        } else {
            max_concurrent
        };

        Self {
            batch_size,
            max_concurrent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_zero_durations_fall_back_to_defaults() {
        let config = LedgerConfig::new(Duration::ZERO, 0, Duration::ZERO);
        let default = LedgerConfig::default();
        assert_eq!(config.lock_timeout, default.lock_timeout);
        assert_eq!(config.retry_backoff, default.retry_backoff);
        assert_eq!(config.max_retries, 0);
    }

    #[rstest]
    #[case(1, 10)]
    #[case(2, 20)]
    #[case(3, 40)]
    #[case(4, 80)]
    fn test_backoff_doubles(#[case] retry: u32, #[case] expected_ms: u64) {
        let config = LedgerConfig::new(Duration::from_secs(1), 5, Duration::from_millis(10));
        assert_eq!(config.backoff_for(retry), Duration::from_millis(expected_ms));
    }

    #[rstest]
    #[case::custom(2000, 8, 2000, 8)]
    #[case::zero_batch(0, 8, 1000, 8)]
    #[case::zero_concurrency(500, 0, 500, num_cpus::get())]
    fn test_replay_config(
        #[case] batch_size: usize,
        #[case] max_concurrent: usize,
        #[case] expected_batch: usize,
        #[case] expected_concurrent: usize,
    ) {
        let config = ReplayConfig::new(batch_size, max_concurrent);
        assert_eq!(config.batch_size, expected_batch);
        assert_eq!(config.max_concurrent, expected_concurrent);
    }
}
