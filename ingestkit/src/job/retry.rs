//! Retry discipline for chunk processing (§4.3): exponential backoff with
//! jitter, capped at `max_retries`. Directly grounded on `RetryConfig` from
//! this crate's request-lifecycle retry logic — same shape, reused for
//! chunk-level transient failures instead of per-request HTTP retries.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub backoff_factor: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_ms: 500,
            backoff_factor: 2,
            max_backoff_ms: 30_000,
        }
    }
}

/// Whether a chunk failure should be retried or recorded as permanently
/// failed. Transient failures (storage, DB deadlock, connection reset) retry;
/// permanent failures (unparseable chunk header, schema mismatch) do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Transient,
    Permanent,
}

/// Computes the backoff duration for a given retry attempt (0-indexed),
/// with up to 20% jitter applied to avoid thundering-herd retries across
/// many chunk workers.
pub fn backoff_duration(attempt: u32, config: &RetryConfig) -> Duration {
    let exponential = config.backoff_ms.saturating_mul(config.backoff_factor.saturating_pow(attempt));
    let capped = exponential.min(config.max_backoff_ms);

    let jitter_fraction = rand::rng().random_range(0.0..0.2);
    let jittered = (capped as f64) * (1.0 + jitter_fraction);
    Duration::from_millis(jittered.round() as u64)
}

pub fn should_retry(attempt: u32, config: &RetryConfig) -> bool {
    attempt < config.max_retries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_is_capped() {
        let config = RetryConfig {
            max_retries: 10,
            backoff_ms: 100,
            backoff_factor: 2,
            max_backoff_ms: 1000,
        };
        let d0 = backoff_duration(0, &config);
        let d3 = backoff_duration(3, &config);
        let d10 = backoff_duration(10, &config);

        assert!(d0.as_millis() >= 100);
        assert!(d3.as_millis() > d0.as_millis());
        // attempt 10 would be 100*2^10 = 102400ms uncapped; must respect the cap plus jitter.
        assert!(d10.as_millis() <= 1200);
    }

    #[test]
    fn retry_exhausts_at_max_retries() {
        let config = RetryConfig {
            max_retries: 3,
            ..Default::default()
        };
        assert!(should_retry(0, &config));
        assert!(should_retry(2, &config));
        assert!(!should_retry(3, &config));
    }
}
