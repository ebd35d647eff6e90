//! Server configuration

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Host used when none is given
pub const DEFAULT_HOST: &str = "localhost";

/// Port used when none is given
pub const DEFAULT_PORT: u16 = 5678;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host name or IP address to bind to
    pub host: String,

    /// TCP port to bind to
    pub port: u16,

    /// HTML file served at `/` (built-in page when `None`)
    pub index_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            index_path: None,
        }
    }
}

impl ServerConfig {
    /// Create a new config for `host:port`
    pub fn with_addr(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Serve a file from disk as the home page
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(path.into());
        self
    }

    /// Address string suitable for binding
    ///
    /// IPv6 literals are bracketed.
    pub fn addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Check the configuration before binding
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".into()));
        }
        Ok(())
    }
}
