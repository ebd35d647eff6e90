//! SSE server listener
//!
//! Binds the TCP listener, owns the broker and serves the router.

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::registry::{Broker, RegistryConfig};
use crate::server::config::ServerConfig;
use crate::server::routes::{build_router, AppState};

/// SSE broadcast server
///
/// Must be created inside a tokio runtime: the broker's coordination loop is
/// spawned on construction.
pub struct SseServer {
    config: ServerConfig,
    broker: Broker,
    broker_task: JoinHandle<()>,
}

impl SseServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry_config(config, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        let (broker, broker_task) = Broker::spawn_with_config(registry_config);

        Self {
            config,
            broker,
            broker_task,
        }
    }

    /// Get a handle to the broker
    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Router serving this server's broker
    pub fn router(&self) -> Router {
        build_router(AppState::new(
            self.broker.clone(),
            self.config.index_path.clone(),
        ))
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        self.config.validate()?;
        Ok(TcpListener::bind(self.config.addr()).await?)
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// On shutdown the broker is stopped, which ends every open event stream
    /// so in-flight connections can finish.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Starting server at http://{}", addr);

        let broker = self.broker.clone();
        let signal = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");

            if let Ok(stats) = broker.stats().await {
                tracing::info!(
                    subscribers = stats.active_subscribers,
                    events = stats.events_published,
                    deliveries = stats.deliveries,
                    average_fanout = stats.average_fanout(),
                    uptime_secs = stats.uptime.as_secs(),
                    "Closing event streams"
                );
            }
            broker.shutdown();
        };

        axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> String {
        self.config.addr()
    }
}

impl Drop for SseServer {
    fn drop(&mut self) {
        self.broker_task.abort();
    }
}
