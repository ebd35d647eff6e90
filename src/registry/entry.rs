//! Subscriber identity and per-subscriber state
//!
//! This module defines what the registry stores for each live subscriber.

use std::time::Instant;

use tokio::sync::mpsc;

use super::event::Event;

/// Slots in a subscriber channel. The loop additionally waits for the slot to
/// drain after every send, so a handoff completes only once the reader has
/// taken the event.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 1;

/// Unique identifier of a subscriber channel
///
/// Allocated from a monotonic counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub(super) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Numeric value of the id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Create the two halves of a subscriber channel
pub(super) fn channel() -> (mpsc::Sender<Event>, mpsc::Receiver<Event>) {
    mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY)
}

/// The subscriber went away before the event could be handed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Gone;

/// Entry for a single subscriber in the registry
#[derive(Debug)]
pub struct SubscriberEntry {
    /// Sending half; dropping it closes the subscriber channel
    tx: mpsc::Sender<Event>,

    /// When the subscriber was registered
    pub registered_at: Instant,

    /// Events handed to this subscriber so far
    pub delivered: u64,

    /// Position in registration arrival order, set by the subscriber set
    pub(super) seq: u64,
}

impl SubscriberEntry {
    pub(super) fn new(tx: mpsc::Sender<Event>) -> Self {
        Self {
            tx,
            registered_at: Instant::now(),
            delivered: 0,
            seq: 0,
        }
    }

    /// Whether the reading half has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Hand `event` to the subscriber, waiting until it has been taken
    pub(super) async fn deliver(&mut self, event: Event) -> Result<(), Gone> {
        self.tx.send(event).await.map_err(|_| Gone)?;
        self.delivered += 1;

        // The slot frees up once the reader takes the event. A reader that
        // disappears in between has nothing left to wait for.
        if let Ok(permit) = self.tx.reserve().await {
            drop(permit);
        }
        Ok(())
    }
}
