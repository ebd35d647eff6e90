//! howler - Server-Sent Events broadcaster
//!
//! # Usage
//!
//! ```bash
//! # Serve on localhost:5678
//! howler
//!
//! # Bind elsewhere
//! howler -h 0.0.0.0 -p 8080
//!
//! # Subscribe and publish
//! curl -N http://localhost:5678/events
//! curl http://localhost:5678/send/hello
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use howler::server::config::{DEFAULT_HOST, DEFAULT_PORT};
use howler::{RegistryConfig, ServerConfig, SseServer};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// howler - in-memory Server-Sent Events broadcaster
#[derive(Parser, Debug)]
#[command(name = "howler")]
#[command(version, about, long_about = None, disable_help_flag = true)]
struct Cli {
    /// Host to bind to
    #[arg(short = 'h', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to bind to
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// HTML file to serve at `/` instead of the built-in page
    #[arg(long, value_name = "PATH")]
    index: Option<PathBuf>,

    /// Disconnect subscribers that take longer than this to accept an event
    /// (default: wait indefinitely)
    #[arg(long, value_name = "MS")]
    slow_subscriber_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::with_addr(self.host.clone(), self.port);
        if let Some(path) = &self.index {
            config = config.index_path(path.clone());
        }
        config
    }

    fn registry_config(&self) -> RegistryConfig {
        match self.slow_subscriber_timeout_ms {
            Some(ms) => RegistryConfig::default().slow_subscriber_timeout(Duration::from_millis(ms)),
            None => RegistryConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let server = SseServer::with_registry_config(cli.server_config(), cli.registry_config());
    server.run_until(shutdown_signal()).await?;

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        // Never resolve: keep serving rather than exiting on a broken handler
        std::future::pending::<()>().await;
    }
}
