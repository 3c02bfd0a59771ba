//! Connection state tracking

use std::fmt;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Why a channel left the `Open` state (or never reached it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// One of the endpoints reported end-of-stream
    EndOfStream,
    /// A read or write on the live handle failed
    TransportError,
    /// The channel-open event carried an error
    NegotiationFailed,
    /// The owner tore the channel down
    LocalTeardown,
}

/// Connection state for one L2CAP channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Idle,
    Negotiating,
    Open,
    Closed(CloseReason),
}

impl ConnectionState {
    /// Check if the channel is open
    pub fn is_open(&self) -> bool {
        *self == ConnectionState::Open
    }

    /// Check if the channel is closed for any reason
    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed(_))
    }

    /// Closed because negotiation or the transport failed
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            ConnectionState::Closed(CloseReason::NegotiationFailed | CloseReason::TransportError)
        )
    }

    /// Whether a "channel opened" event may be accepted in this state
    pub fn accepts_channel(&self) -> bool {
        !self.is_open()
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Negotiating => write!(f, "negotiating"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closed(reason) => write!(f, "closed ({:?})", reason),
        }
    }
}

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Running counters for one channel handle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Bytes accepted by the output stream
    pub bytes_written: u64,
    /// Bytes delivered to the receiver
    pub bytes_received: u64,
    /// Number of chunks delivered to the receiver
    pub chunks_delivered: u64,
    /// Writes that accepted fewer bytes than offered
    pub short_writes: u64,
    /// Reads that returned nothing while bytes were reported available
    pub empty_reads: u64,
}
