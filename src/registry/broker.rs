//! Coordination loop and its handle
//!
//! [`Broker`] is a cheap, cloneable handle. Every operation on it becomes a
//! [`Command`] on one unbounded queue, consumed in arrival order by a single
//! [`BrokerLoop`] task that owns the [`SubscriberSet`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::stats::BrokerStats;

use super::config::{RegistryConfig, SlowSubscriberPolicy};
use super::entry::{self, SubscriberEntry, SubscriberId};
use super::error::RegistryError;
use super::event::Event;
use super::store::SubscriberSet;
use super::subscription::Subscription;

/// Requests understood by the coordination loop
enum Command {
    Register {
        id: SubscriberId,
        entry: SubscriberEntry,
    },
    Deregister {
        id: SubscriberId,
    },
    Publish {
        event: Event,
        done: oneshot::Sender<usize>,
    },
    Stats {
        reply: oneshot::Sender<BrokerStats>,
    },
    Members {
        reply: oneshot::Sender<Vec<SubscriberId>>,
    },
    Shutdown,
}

/// Handle to the coordination loop
///
/// # Example
/// ```no_run
/// use howler::Broker;
///
/// # async fn example() -> Result<(), howler::registry::RegistryError> {
/// let (broker, _task) = Broker::spawn();
/// let mut subscription = broker.register()?;
///
/// tokio::spawn(async move {
///     while let Some(event) = subscription.recv().await {
///         println!("got {}", event);
///     }
/// });
///
/// broker.publish("hello").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Broker {
    commands: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
}

impl Broker {
    /// Create a handle and the loop it talks to, without starting the loop
    pub fn new(config: RegistryConfig) -> (Self, BrokerLoop) {
        let (tx, rx) = mpsc::unbounded_channel();

        let broker = Self {
            commands: tx,
            next_id: Arc::new(AtomicU64::new(1)),
        };
        let event_loop = BrokerLoop {
            commands: rx,
            subscribers: SubscriberSet::new(),
            config,
            stats: BrokerStats::new(),
            started_at: Instant::now(),
        };

        (broker, event_loop)
    }

    /// Start a loop with default configuration on the current runtime
    pub fn spawn() -> (Self, JoinHandle<()>) {
        Self::spawn_with_config(RegistryConfig::default())
    }

    /// Start a loop with custom configuration on the current runtime
    pub fn spawn_with_config(config: RegistryConfig) -> (Self, JoinHandle<()>) {
        let (broker, event_loop) = Self::new(config);
        let handle = tokio::spawn(event_loop.run());
        (broker, handle)
    }

    /// Register a new subscriber
    ///
    /// The subscriber is a member of the set for every request submitted
    /// after this call returns, until its [`Subscription`] is deregistered or
    /// dropped.
    pub fn register(&self) -> Result<Subscription, RegistryError> {
        let id = SubscriberId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = entry::channel();

        self.submit(Command::Register {
            id,
            entry: SubscriberEntry::new(tx),
        })?;

        Ok(Subscription::new(id, rx, self.clone()))
    }

    /// Ask the loop to remove `id` and close its channel.
    ///
    /// Only [`Subscription`] calls this, and at most once.
    pub(super) fn deregister(&self, id: SubscriberId) {
        if self.submit(Command::Deregister { id }).is_err() {
            tracing::debug!(subscriber = %id, "Broker stopped, nothing to deregister");
        }
    }

    /// Deliver `event` to every registered subscriber
    ///
    /// Resolves once the fan-out has finished, with the number of subscribers
    /// that took the event. Zero subscribers is not an error.
    pub async fn publish(&self, event: impl Into<Event>) -> Result<usize, RegistryError> {
        let (done, delivered) = oneshot::channel();
        self.submit(Command::Publish {
            event: event.into(),
            done,
        })?;
        delivered.await.map_err(|_| RegistryError::BrokerClosed)
    }

    /// Snapshot of loop counters
    pub async fn stats(&self) -> Result<BrokerStats, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Stats { reply })?;
        rx.await.map_err(|_| RegistryError::BrokerClosed)
    }

    /// Ids of the currently registered subscribers, in the order the loop
    /// processed their registrations
    pub async fn subscribers(&self) -> Result<Vec<SubscriberId>, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Members { reply })?;
        rx.await.map_err(|_| RegistryError::BrokerClosed)
    }

    /// Stop the loop once the requests queued so far have been processed.
    ///
    /// Every subscriber channel is closed, so open streams end.
    pub fn shutdown(&self) {
        let _ = self.submit(Command::Shutdown);
    }

    /// Whether the loop has stopped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn submit(&self, command: Command) -> Result<(), RegistryError> {
        self.commands
            .send(command)
            .map_err(|_| RegistryError::BrokerClosed)
    }
}

/// The coordination loop
///
/// Sole owner of the subscriber set. Runs until [`Broker::shutdown`] is
/// requested or every [`Broker`] handle has been dropped.
pub struct BrokerLoop {
    commands: mpsc::UnboundedReceiver<Command>,
    subscribers: SubscriberSet,
    config: RegistryConfig,
    stats: BrokerStats,
    started_at: Instant,
}

impl BrokerLoop {
    /// Process requests in arrival order
    pub async fn run(mut self) {
        tracing::debug!(policy = ?self.config.slow_subscriber_policy, "Broker loop started");

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Register { id, entry } => self.register(id, entry),
                Command::Deregister { id } => self.deregister(id),
                Command::Publish { event, done } => {
                    let delivered = self.publish(event).await;
                    // The publisher may have gone away mid fan-out
                    let _ = done.send(delivered);
                }
                Command::Stats { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                Command::Members { reply } => {
                    let _ = reply.send(self.subscribers.ids());
                }
                Command::Shutdown => break,
            }
        }

        // Anything still queued is dropped with the receiver; queued
        // registrations close immediately.
        self.commands.close();
        let closed = self.subscribers.clear();
        tracing::info!(closed_subscribers = closed, "Broker loop stopped");
    }

    fn register(&mut self, id: SubscriberId, entry: SubscriberEntry) {
        self.stats.registrations += 1;

        if !self.subscribers.insert(id, entry) {
            tracing::warn!(subscriber = %id, "Duplicate registration ignored");
            return;
        }

        tracing::info!(
            subscriber = %id,
            subscribers = self.subscribers.len(),
            "Subscriber added"
        );
    }

    fn deregister(&mut self, id: SubscriberId) {
        self.stats.deregistrations += 1;

        // Dropping the entry drops the sender, which closes the channel
        match self.subscribers.remove(id) {
            Some(entry) => {
                tracing::info!(
                    subscriber = %id,
                    subscribers = self.subscribers.len(),
                    delivered = entry.delivered,
                    connected_ms = entry.registered_at.elapsed().as_millis() as u64,
                    "Subscriber removed"
                );
            }
            None => {
                tracing::debug!(subscriber = %id, "Subscriber already removed");
            }
        }
    }

    async fn publish(&mut self, event: Event) -> usize {
        let policy = self.config.slow_subscriber_policy;
        let mut delivered = 0;
        let mut too_slow = Vec::new();

        if self.subscribers.is_empty() {
            tracing::debug!(event = %event, "No subscribers to broadcast to");
        }

        for (id, entry) in self.subscribers.iter_mut() {
            if entry.is_closed() {
                tracing::debug!(subscriber = %id, "Subscriber gone, skipping");
                continue;
            }

            let handed_over = match policy {
                SlowSubscriberPolicy::Block => entry.deliver(event.clone()).await.is_ok(),
                SlowSubscriberPolicy::Disconnect { timeout } => {
                    match tokio::time::timeout(timeout, entry.deliver(event.clone())).await {
                        Ok(result) => result.is_ok(),
                        Err(_) => {
                            too_slow.push(*id);
                            continue;
                        }
                    }
                }
            };

            if handed_over {
                delivered += 1;
            } else {
                tracing::debug!(subscriber = %id, "Subscriber gone, skipping");
            }
        }

        for id in too_slow {
            if self.subscribers.remove(id).is_some() {
                self.stats.dropped_subscribers += 1;
                tracing::warn!(subscriber = %id, "Slow subscriber disconnected");
            }
        }

        self.stats.events_published += 1;
        self.stats.deliveries += delivered as u64;

        tracing::info!(
            event = %event,
            subscribers = delivered,
            "Broadcast event"
        );

        delivered
    }

    fn snapshot(&self) -> BrokerStats {
        BrokerStats {
            active_subscribers: self.subscribers.len(),
            uptime: self.started_at.elapsed(),
            ..self.stats.clone()
        }
    }
}
