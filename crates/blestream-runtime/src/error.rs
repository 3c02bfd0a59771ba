//! Error types for the connection runtime

use blestream_core::ChannelError;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by connection tasks and the registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Connection task has stopped")]
    TaskStopped,

    #[error("Peripheral already registered: {peripheral}")]
    AlreadyRegistered { peripheral: Uuid },

    #[error("Unknown peripheral: {peripheral}")]
    UnknownPeripheral { peripheral: Uuid },

    #[error("Too many connections (max: {max})")]
    TooManyConnections { max: usize },

    #[error("Invalid runtime configuration: {reason}")]
    InvalidConfiguration { reason: String },
}

impl RuntimeError {
    /// Whether the error is the channel's `NotConnected` rejection
    pub fn is_not_connected(&self) -> bool {
        matches!(self, RuntimeError::Channel(ChannelError::NotConnected))
    }
}

/// Result type for runtime operations
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
