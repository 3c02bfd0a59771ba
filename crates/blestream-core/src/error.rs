//! Error types for the channel core

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors surfaced by the channel coordinator and its components
///
/// Transport-level variants are delivered to the caller through
/// [`ChannelObserver::on_transport_error`](crate::ChannelObserver::on_transport_error);
/// only `send` and `channel_opened` return them directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Channel negotiation failed: {reason}")]
    NegotiationFailed { reason: String },

    #[error("Transport write failed: {reason}")]
    TransportWriteError { reason: String },

    #[error("Transport read failed: {reason}")]
    TransportReadError { reason: String },

    #[error("Channel is not connected")]
    NotConnected,

    #[error("Send incomplete: {discarded} buffered bytes were discarded")]
    SendIncomplete { discarded: usize },

    #[error("Channel is already open")]
    AlreadyOpen,

    #[error("Invalid channel configuration: {reason}")]
    InvalidConfiguration { reason: String },
}

impl ChannelError {
    /// Whether this error closes the active channel handle
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChannelError::NegotiationFailed { .. }
                | ChannelError::TransportWriteError { .. }
                | ChannelError::TransportReadError { .. }
        )
    }
}

/// Failure reported by a stream endpoint primitive
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stream is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

impl StreamError {
    pub(crate) fn into_write_error(self) -> ChannelError {
        ChannelError::TransportWriteError {
            reason: self.to_string(),
        }
    }

    pub(crate) fn into_read_error(self) -> ChannelError {
        ChannelError::TransportReadError {
            reason: self.to_string(),
        }
    }
}

/// Result type for channel operations
pub type Result<T> = std::result::Result<T, ChannelError>;
