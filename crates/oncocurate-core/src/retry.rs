//! Bounded retry with exponential backoff for transient connector failures.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::connector::ConnectorError;

/// Bounded retry policy.
///
/// The delay before attempt `n + 1` is `base_delay_ms * 2^(n - 1)`, capped at
/// `max_delay_ms`. A server's `Retry-After` hint is honoured up to the same
/// cap. `max_attempts` counts the first attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let ms = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy is exhausted.
///
/// Returns the final result together with the number of attempts made.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> (Result<T, ConnectorError>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ConnectorError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Err(e) if e.is_transient() && policy.allows_retry_after(attempt) => {
                let delay = match &e {
                    ConnectorError::RateLimited {
                        retry_after: Some(after),
                    } => (*after)
                        .max(policy.delay_for(attempt))
                        .min(Duration::from_millis(policy.max_delay_ms)),
                    _ => policy.delay_for(attempt),
                };
                warn!(
                    operation = %operation,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient connector failure; backing off"
                );
                tokio::time::sleep(delay).await;
            }
            other => return (other, attempt),
        }
    }
}
