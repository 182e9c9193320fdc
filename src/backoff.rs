//! Exponential backoff with optional jitter
//!
//! Shared by the signaling channel (reconnect storms across many viewers
//! need randomized jitter) and the destination streaming manager (bounded
//! retry before a session is terminated).

use std::time::Duration;

use rand::Rng;

/// Backoff policy configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub base_delay: Duration,

    /// Upper bound on any single delay
    pub max_delay: Duration,

    /// Multiplier applied per attempt
    pub multiplier: f64,

    /// Randomize each delay by ±30% to avoid synchronized retries
    pub jitter: bool,

    /// Maximum number of attempts before giving up
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: false,
            max_attempts: 5,
        }
    }
}

impl BackoffConfig {
    /// Set the base delay
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the delay ceiling
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the per-attempt multiplier
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enable or disable jitter
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the attempt cap
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Raw (un-jittered) delay for a zero-based attempt index.
    ///
    /// Non-decreasing in `attempt` and capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt as i32);
        let millis = (self.base_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }

    /// Delay for an attempt with jitter applied (when enabled)
    pub fn jittered_delay_for(&self, attempt: u32) -> Duration {
        let base = self.delay_for(attempt);
        if !self.jitter {
            return base;
        }
        let mut rng = rand::thread_rng();
        let factor = 1.0 + rng.gen_range(-0.3..0.3);
        Duration::from_millis((base.as_millis() as f64 * factor) as u64)
    }

    /// Whether a zero-based attempt index is still within budget
    pub fn attempt_allowed(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
