//! Streaming manager configuration

use std::time::Duration;

use crate::backoff::BackoffConfig;

/// Destination streaming options
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Reconnect policy: 1 s base doubling to a 30 s ceiling, five attempts
    /// before the session is terminated
    pub backoff: BackoffConfig,

    /// Time box for one ingest negotiation
    pub connect_timeout: Duration,

    /// Interval between health samples while publishing
    pub health_interval: Duration,

    /// Packet loss above this fraction marks the session degraded
    pub degraded_max_loss: f32,

    /// Bitrate below this (bits/sec) marks the session degraded
    pub degraded_min_bitrate: u64,

    /// Capacity of the streaming event broadcast channel
    pub event_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default()
                .base_delay(Duration::from_secs(1))
                .max_delay(Duration::from_secs(30))
                .multiplier(2.0)
                .jitter(false)
                .max_attempts(5),
            connect_timeout: Duration::from_secs(10),
            health_interval: Duration::from_secs(2),
            degraded_max_loss: 0.05,
            degraded_min_bitrate: 100_000,
            event_capacity: 256,
        }
    }
}

impl StreamingConfig {
    /// Replace the reconnect policy
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the negotiation time box
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the health sampling interval
    pub fn health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// Set the degradation thresholds
    pub fn degraded_thresholds(mut self, max_loss: f32, min_bitrate: u64) -> Self {
        self.degraded_max_loss = max_loss;
        self.degraded_min_bitrate = min_bitrate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamingConfig::default();

        assert_eq!(config.backoff.max_attempts, 5);
        assert_eq!(config.backoff.base_delay, Duration::from_secs(1));
        assert_eq!(config.backoff.max_delay, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.degraded_max_loss, 0.05);
    }

    #[test]
    fn test_builder_chaining() {
        let config = StreamingConfig::default()
            .connect_timeout(Duration::from_secs(3))
            .health_interval(Duration::from_millis(500))
            .degraded_thresholds(0.1, 50_000);

        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.health_interval, Duration::from_millis(500));
        assert_eq!(config.degraded_max_loss, 0.1);
        assert_eq!(config.degraded_min_bitrate, 50_000);
    }
}
