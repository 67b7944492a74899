//! Error types for Beacon Remote

use thiserror::Error;

/// Result type alias for Beacon Remote operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Beacon Remote
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected input (empty trigger or payload, malformed command table)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A connect attempt is already running
    #[error("connect already in progress")]
    AlreadyInProgress,

    /// Send attempted outside a ready session
    #[error("not connected")]
    NotConnected,

    /// Discovery, connect or write failure reported by the transport
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport lost the link to the peripheral
    #[error("link lost: {0}")]
    LinkLost(String),

    /// The dispatch loop has shut down
    #[error("dispatch loop stopped")]
    DispatchStopped,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
