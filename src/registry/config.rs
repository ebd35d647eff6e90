//! Registry configuration

use std::time::Duration;

/// What the coordination loop does with a subscriber that is not reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlowSubscriberPolicy {
    /// Wait for the subscriber however long it takes.
    ///
    /// A stalled subscriber stalls fan-out to everyone else and delays every
    /// request queued behind the current publish.
    #[default]
    Block,
    /// Remove the subscriber (closing its channel) if it does not take an
    /// event within `timeout`.
    Disconnect {
        /// Per-subscriber handoff deadline
        timeout: Duration,
    },
}

/// Configuration for the subscriber registry
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Slow-subscriber handling during fan-out
    pub slow_subscriber_policy: SlowSubscriberPolicy,
}

impl RegistryConfig {
    /// Set the slow-subscriber policy
    pub fn slow_subscriber_policy(mut self, policy: SlowSubscriberPolicy) -> Self {
        self.slow_subscriber_policy = policy;
        self
    }

    /// Disconnect subscribers that take longer than `timeout` to accept an event
    pub fn slow_subscriber_timeout(self, timeout: Duration) -> Self {
        self.slow_subscriber_policy(SlowSubscriberPolicy::Disconnect { timeout })
    }
}
