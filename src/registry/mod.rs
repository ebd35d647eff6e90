//! Subscriber registry for event fan-out
//!
//! The registry tracks live subscribers and routes published events to them.
//! All mutation goes through one coordination task, so the subscriber set is
//! never shared and never locked.
//!
//! # Architecture
//!
//! ```text
//!                        BrokerLoop (one task)
//!                   ┌──────────────────────────┐
//!   Register ──────►│ subscribers: HashMap<Id, │
//!   Deregister ────►│   SubscriberEntry {      │
//!   Publish ───────►│     tx: mpsc::Sender,    │
//!   (in order)      │   }>                     │
//!                   └────────────┬─────────────┘
//!                                │ handoff, one at a time
//!         ┌──────────────────────┼──────────────────────┐
//!         ▼                      ▼                      ▼
//!   [Subscription]         [Subscription]         [Subscription]
//!   rx.recv()              rx.recv()              rx.recv()
//!         │                      │                      │
//!         └──► EventStream ──► `data: Event: ...` ──► HTTP body
//! ```
//!
//! # Closing
//!
//! Only the loop holds a subscriber's sending half. Removing the entry drops
//! the sender, which is the one and only way a subscriber channel closes.
//! A [`Subscription`] submits its deregistration at most once, when it is
//! dropped or explicitly deregistered.

pub mod broker;
pub mod config;
pub mod entry;
pub mod error;
pub mod event;
pub mod store;
pub mod subscription;

pub use broker::Broker;
pub use config::{RegistryConfig, SlowSubscriberPolicy};
pub use entry::{SubscriberEntry, SubscriberId};
pub use error::RegistryError;
pub use event::Event;
pub use store::SubscriberSet;
pub use subscription::Subscription;
