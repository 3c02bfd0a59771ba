//! Tokio execution context for blestream channels
//!
//! A channel coordinator is single-owner. This crate gives each one a
//! dedicated task and hands out cloneable handles so application threads and
//! transport callbacks can reach it without sharing mutable state:
//!
//! - [`task`] - the connection task, its handles and emitted events
//! - [`registry`] - one connection task per peripheral
//! - [`sim`] - an in-memory L2CAP link for tests and demos
//! - [`config`] - runtime settings
//! - [`error`] - error types

pub mod config;
pub mod error;
pub mod registry;
pub mod sim;
pub mod task;

// Public API exports
pub use config::RuntimeConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use registry::ConnectionRegistry;
pub use sim::{LinkConfig, SimInput, SimOutput, SimulatedPeer};
pub use task::{
    BoxedInput, BoxedOutput, ChannelEvent, ConnectionHandle, ConnectionParts, ConnectionTask,
    RuntimeChannel, TransportEventSink,
};

pub use blestream_core::{ChannelConfig, ChannelError, CloseReason, ConnectionState};
