//! howler: in-memory Server-Sent Events broadcaster
//!
//! Clients open a long-lived `GET /events` stream and receive every event
//! published through `GET /send/{event}` while they stay connected.
//!
//! The heart of the crate is the [`Broker`](registry::Broker): a single
//! coordination task that owns the set of live subscribers and processes
//! registration, deregistration and publish requests strictly in arrival
//! order. Everything else (routing, the home page, CLI flags) is glue around it.
//!
//! # Example
//! ```no_run
//! use howler::{ServerConfig, SseServer};
//!
//! # async fn example() -> howler::error::Result<()> {
//! let server = SseServer::new(ServerConfig::default().port(8080));
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod registry;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use registry::{Broker, Event, RegistryConfig, SlowSubscriberPolicy, Subscription};
pub use server::{ServerConfig, SseServer};
pub use stats::BrokerStats;
