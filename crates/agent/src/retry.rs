//! Bounded retry schedule for model calls

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;

use wtf_config::RetryConfig;

/// Attempt count plus the exponential backoff settings for the waits between
/// attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
    backoff: f64,
    randomization: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// `jitter_ms` is a spread around the first delay, so it becomes a
    /// randomization factor relative to `delay_ms`
    pub fn from_config(config: &RetryConfig) -> Self {
        let randomization = if config.delay_ms == 0 {
            0.0
        } else {
            (config.jitter_ms as f64 / config.delay_ms as f64).clamp(0.0, 1.0)
        };

        Self {
            attempts: config.attempts.max(1),
            delay: Duration::from_millis(config.delay_ms),
            backoff: config.backoff.max(1.0),
            randomization,
        }
    }

    /// Same attempt count, no waiting
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            delay: Duration::ZERO,
            backoff: 1.0,
            randomization: 0.0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Fresh wait schedule for one model call.
    ///
    /// Never runs out on elapsed time; [`RetryPolicy::attempts`] bounds it.
    pub fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.delay,
            initial_interval: self.delay,
            randomization_factor: self.randomization,
            multiplier: self.backoff,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    /// The waits between attempts, in order
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let mut schedule = self.schedule();
        let waits = self.attempts.saturating_sub(1) as usize;
        std::iter::from_fn(move || schedule.next_backoff()).take(waits)
    }
}
