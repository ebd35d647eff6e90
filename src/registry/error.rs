//! Registry error types

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The coordination loop has stopped and accepts no more requests
    BrokerClosed,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::BrokerClosed => write!(f, "Broker is not running"),
        }
    }
}

impl std::error::Error for RegistryError {}
