//! HTTP server
//!
//! Exposes the broker over three routes: `GET /events` (SSE stream),
//! `GET /send/{event}` (publish) and `GET /` (home page).

pub mod config;
pub mod listener;
pub mod routes;
pub mod sse;
pub mod stream;

pub use config::ServerConfig;
pub use listener::SseServer;
pub use routes::{build_router, AppState};
pub use stream::{EventStream, StreamPhase};
