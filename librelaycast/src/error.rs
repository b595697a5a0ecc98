//! Error types for Relaycast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelaycastError>;

#[derive(Error, Debug)]
pub enum RelaycastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RelaycastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RelaycastError::InvalidInput(_) => 3,
            RelaycastError::Feed(FeedError::Authentication(_)) => 2,
            RelaycastError::Feed(_) => 1,
            RelaycastError::Channel(_) => 1,
            RelaycastError::Config(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Errors raised by the upstream feed API.
#[derive(Error, Debug, Clone)]
pub enum FeedError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),
}

impl FeedError {
    /// Whether the failure is expected to clear on its own.
    ///
    /// Transient failures abandon the current poll tick; the next tick
    /// proceeds as if nothing happened.
    pub fn is_transient(&self) -> bool {
        matches!(self, FeedError::Upstream(_))
    }
}

/// Errors raised on the push channel, on either end.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Connection closed")]
    Closed,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
