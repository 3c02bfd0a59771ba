//! Flow-controlled byte-stream core for BLE L2CAP channels
//!
//! Once a peripheral has negotiated an L2CAP channel, the platform hands over
//! two half-duplex byte streams that signal readiness asynchronously. This
//! crate moves raw bytes across such a channel without caring what platform
//! produced it:
//!
//! - [`buffer`] - FIFO outbound buffer with front-only consumption
//! - [`stream`] - endpoint traits, readiness events and channel handles
//! - [`writer`] - drains the outbound buffer as the transport reports space
//! - [`reader`] - reads everything available into owned chunks
//! - [`coordinator`] - the open/close state machine tying them together
//! - [`config`] - tunables for a coordinator
//! - [`state`] - connection state and per-channel statistics
//! - [`error`] - error types
//!
//! The crate is synchronous and does no polling. Whoever owns a
//! [`ChannelCoordinator`] feeds it transport events on one execution context.
//!
//! ## Usage
//!
//! ```rust
//! use blestream_core::{
//!     ChannelConfig, ChannelCoordinator, ChannelError, ChannelHandle, ChannelObserver,
//!     Endpoint, StreamEvent,
//! };
//! # use blestream_core::{ReadableStream, WritableStream, StreamError};
//! # struct Input;
//! # impl ReadableStream for Input {
//! #     fn has_bytes_available(&self) -> bool { false }
//! #     fn read(&mut self, _: &mut [u8]) -> Result<usize, StreamError> { Ok(0) }
//! # }
//! # struct Output;
//! # impl WritableStream for Output {
//! #     fn has_space_available(&self) -> bool { true }
//! #     fn write(&mut self, data: &[u8]) -> Result<usize, StreamError> { Ok(data.len()) }
//! # }
//!
//! struct Printer;
//!
//! impl ChannelObserver for Printer {
//!     fn on_data_received(&mut self, chunk: Vec<u8>) {
//!         println!("received {} bytes", chunk.len());
//!     }
//!
//!     fn on_transport_error(&mut self, error: &ChannelError) {
//!         eprintln!("channel error: {error}");
//!     }
//! }
//!
//! # fn main() -> Result<(), ChannelError> {
//! let mut coordinator = ChannelCoordinator::new(&ChannelConfig::default(), Printer)?;
//! assert_eq!(coordinator.send(b"early"), Err(ChannelError::NotConnected));
//!
//! let id = coordinator.channel_opened(Ok(ChannelHandle::new(Input, Output)))?;
//! coordinator.send(b"HELLO")?;
//! coordinator.handle_event(id, Endpoint::Input, StreamEvent::HasBytesAvailable);
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod reader;
pub mod state;
pub mod stream;
pub mod writer;

// Public API exports
pub use buffer::OutboundBuffer;
pub use config::ChannelConfig;
pub use coordinator::{ChannelCoordinator, ChannelObserver};
pub use error::{ChannelError, Result, StreamError};
pub use reader::{ReadOutcome, StreamReader};
pub use state::{ChannelStats, CloseReason, ConnectionState};
pub use stream::{ChannelHandle, Endpoint, HandleId, ReadableStream, StreamEvent, WritableStream};
pub use writer::{DrainOutcome, FlowControlledWriter};
