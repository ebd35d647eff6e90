//! Counters kept by the coordination loop

use std::time::Duration;

/// Snapshot of broker activity
///
/// Produced by the coordination loop on request, so every field reflects the
/// same point in the request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Subscribers currently registered
    pub active_subscribers: usize,
    /// Registrations processed since start
    pub registrations: u64,
    /// Deregistration requests processed since start (including no-ops)
    pub deregistrations: u64,
    /// Publish requests processed
    pub events_published: u64,
    /// Individual event handoffs to subscribers
    pub deliveries: u64,
    /// Subscribers removed by the slow-subscriber policy
    pub dropped_subscribers: u64,
    /// Time since the loop started
    pub uptime: Duration,
}

impl BrokerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Average number of subscribers reached per published event
    pub fn average_fanout(&self) -> f64 {
        if self.events_published > 0 {
            self.deliveries as f64 / self.events_published as f64
        } else {
            0.0
        }
    }
}
