//! Exponential backoff with proportional jitter.
//!
//! Attempts are unbounded: the walker retries a height until it succeeds or
//! shutdown is requested. Only the delay between attempts is bounded.

use std::time::Duration;

use crate::config::RetryConfig;

/// Shape of the delay sequence between consecutive failures.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Proportional jitter in `[0, 1]`.
    pub jitter: f64,
}

impl RetryPolicy {
    /// Retry without any delay at all.
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Start a fresh delay sequence.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            attempts: 0,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            jitter: config.jitter.clamp(0.0, 1.0),
        }
    }
}

/// Stateful delay sequence for one run of consecutive failures.
#[derive(Clone, Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    attempts: u32,
}

impl Backoff {
    /// Delay to sleep before the next attempt. Grows by `multiplier` per
    /// call, is capped at `max_delay`, then jittered.
    pub fn next_delay(&mut self) -> Duration {
        let policy = &self.policy;
        let exp = policy.multiplier.powi(self.attempts.min(i32::MAX as u32) as i32);
        let base = (policy.initial_delay.as_secs_f64() * exp).min(policy.max_delay.as_secs_f64());
        self.attempts = self.attempts.saturating_add(1);

        let factor = if policy.jitter > 0.0 {
            1.0 + policy.jitter * (2.0 * rand::random::<f64>() - 1.0)
        } else {
            1.0
        };
        Duration::from_secs_f64((base * factor).max(0.0))
    }

    /// Forget past failures; the next delay is `initial_delay` again.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Consecutive failures seen since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
