//! Rate-limit governor and request pacing.
//!
//! The governor counts consecutive fetch failures for one pipeline instance.
//! Below the threshold every failure costs the short default delay; the
//! failure that reaches the threshold costs the long cooldown and resets the
//! count. Any success resets it as well.
//!
//! The governor is consulted by the caller after a fetch; it never retries
//! on its own.

use rand::Rng;
use std::time::Duration;
use tracing::warn;

/// Backoff settings
#[derive(Clone, Debug)]
pub struct GovernorConfig {
    /// Consecutive failures that trigger the cooldown (default: 5)
    pub error_threshold: u32,
    /// Delay after a failure below the threshold (default: 5s)
    pub default_delay: Duration,
    /// Delay once the threshold is reached (default: 30s)
    pub cooldown: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            error_threshold: 5,
            default_delay: Duration::from_secs(5),
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
pub struct RetryGovernor {
    config: GovernorConfig,
    consecutive_failures: u32,
}

impl RetryGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Count a failure and return how long the caller should wait.
    pub fn record_failure(&mut self) -> Duration {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.config.error_threshold {
            warn!(
                "Rate limit suspected after {} consecutive failures, cooling down for {:?}",
                self.consecutive_failures, self.config.cooldown
            );
            self.consecutive_failures = 0;
            self.config.cooldown
        } else {
            self.config.default_delay
        }
    }

    /// Count a failure and sleep the resulting delay
    pub async fn on_failure(&mut self) {
        let delay = self.record_failure();
        tokio::time::sleep(delay).await;
    }
}

impl Default for RetryGovernor {
    fn default() -> Self {
        Self::new(GovernorConfig::default())
    }
}

/// Uniform random pause after each successful single-symbol fetch
#[derive(Clone, Debug)]
pub struct PacingJitter {
    pub min: Duration,
    pub max: Duration,
}

impl Default for PacingJitter {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(1000),
            max: Duration::from_millis(1200),
        }
    }
}

impl PacingJitter {
    /// No pause at all
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let secs = rand::thread_rng().gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
