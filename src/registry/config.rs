//! Registry configuration

/// Participant registry limits
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum participants per session (joins beyond this are rejected)
    pub capacity: usize,

    /// Maximum simultaneously `live` participants.
    ///
    /// Nine fills the largest grid layout (3×3); promotions beyond this
    /// fail with `StageFull`.
    pub max_on_stage: usize,

    /// Capacity of the registry event broadcast channel
    pub event_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            max_on_stage: 9,
            event_capacity: 256,
        }
    }
}

impl RegistryConfig {
    /// Set the session capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the maximum on-stage count
    pub fn max_on_stage(mut self, max: usize) -> Self {
        self.max_on_stage = max;
        self
    }

    /// Set the event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.capacity, 64);
        assert_eq!(config.max_on_stage, 9);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default().capacity(10).max_on_stage(2);

        assert_eq!(config.capacity, 10);
        assert_eq!(config.max_on_stage, 2);
    }
}
