//! In-memory simulated L2CAP link
//!
//! Stands in for the platform Bluetooth stack: it produces a channel handle
//! whose endpoints read from and write to shared queues, and a
//! [`SimulatedPeer`] that plays the remote side and fires readiness
//! notifications through a [`TransportEventSink`]. The link accepts at most
//! `write_window` bytes per write and holds at most `capacity` unread bytes,
//! so short writes and space exhaustion happen naturally.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use blestream_core::{
    ChannelHandle, Endpoint, HandleId, ReadableStream, StreamError, StreamEvent, WritableStream,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{RuntimeError, RuntimeResult};
use crate::task::{BoxedInput, BoxedOutput, TransportEventSink};

// ----------------------------------------------------------------------------
// Link Configuration
// ----------------------------------------------------------------------------

/// Shape of the simulated link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Maximum bytes accepted by one write call
    pub write_window: usize,
    /// Maximum bytes the peer side holds before space runs out
    pub capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            write_window: 251, // LE data length extension payload
            capacity: 4096,
        }
    }
}

impl LinkConfig {
    pub fn with_write_window(mut self, window: usize) -> Self {
        self.write_window = window;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        if self.write_window == 0 || self.capacity == 0 {
            return Err(RuntimeError::InvalidConfiguration {
                reason: "link write_window and capacity must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Shared Link State
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LinkState {
    /// Peer to local
    inbound: VecDeque<u8>,
    /// Local to peer, waiting to be collected
    outbound: VecDeque<u8>,
    write_window: usize,
    capacity: usize,
    read_failure: Option<String>,
    write_failure: Option<String>,
    ended: bool,
    endpoints_closed: usize,
}

type SharedLink = Arc<Mutex<LinkState>>;

fn lock(link: &SharedLink) -> MutexGuard<'_, LinkState> {
    link.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Readable half of a simulated channel
pub struct SimInput {
    link: SharedLink,
}

impl ReadableStream for SimInput {
    fn has_bytes_available(&self) -> bool {
        !lock(&self.link).inbound.is_empty()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let mut link = lock(&self.link);
        if let Some(reason) = link.read_failure.take() {
            return Err(StreamError::Other(reason));
        }

        let count = buf.len().min(link.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(link.inbound.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn close(&mut self) {
        lock(&self.link).endpoints_closed += 1;
    }
}

/// Writable half of a simulated channel
pub struct SimOutput {
    link: SharedLink,
}

impl WritableStream for SimOutput {
    fn has_space_available(&self) -> bool {
        let link = lock(&self.link);
        !link.ended && link.outbound.len() < link.capacity
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, StreamError> {
        let mut link = lock(&self.link);
        if let Some(reason) = link.write_failure.take() {
            return Err(StreamError::Other(reason));
        }
        if link.ended {
            return Err(StreamError::Closed);
        }

        let room = link.capacity.saturating_sub(link.outbound.len());
        let count = data.len().min(link.write_window).min(room);
        link.outbound.extend(&data[..count]);
        trace!(offered = data.len(), accepted = count, "simulated write");
        Ok(count)
    }

    fn close(&mut self) {
        lock(&self.link).endpoints_closed += 1;
    }
}

// ----------------------------------------------------------------------------
// Simulated Peer
// ----------------------------------------------------------------------------

/// The remote side of a simulated channel
pub struct SimulatedPeer {
    link: SharedLink,
    handle: HandleId,
    sink: TransportEventSink,
}

impl SimulatedPeer {
    /// Open a simulated channel and deliver it to the connection behind `sink`
    ///
    /// Mirrors the platform sequence: negotiation, channel opened, both
    /// endpoints report open-completed, and the output reports space.
    pub fn connect(sink: TransportEventSink, config: &LinkConfig) -> RuntimeResult<Self> {
        config.validate()?;

        let link: SharedLink = Arc::new(Mutex::new(LinkState {
            write_window: config.write_window,
            capacity: config.capacity,
            ..LinkState::default()
        }));
        let input: BoxedInput = Box::new(SimInput { link: link.clone() });
        let output: BoxedOutput = Box::new(SimOutput { link: link.clone() });
        let channel = ChannelHandle::new(input, output);
        let handle = channel.id();

        sink.begin_negotiation()?;
        sink.channel_opened(Ok(channel))?;

        let peer = Self { link, handle, sink };
        peer.notify(Endpoint::Input, StreamEvent::OpenCompleted)?;
        peer.notify(Endpoint::Output, StreamEvent::OpenCompleted)?;
        peer.notify(Endpoint::Output, StreamEvent::HasSpaceAvailable)?;
        debug!(handle = %handle, "simulated channel connected");
        Ok(peer)
    }

    pub fn handle_id(&self) -> HandleId {
        self.handle
    }

    /// Deliver bytes to the local side
    pub fn inject(&self, bytes: &[u8]) -> RuntimeResult<()> {
        lock(&self.link).inbound.extend(bytes);
        self.notify(Endpoint::Input, StreamEvent::HasBytesAvailable)
    }

    /// Take everything the local side has written so far
    ///
    /// Freeing space fires a space-available notification.
    pub fn collect(&self) -> RuntimeResult<Vec<u8>> {
        let collected: Vec<u8> = lock(&self.link).outbound.drain(..).collect();
        if !collected.is_empty() {
            self.notify(Endpoint::Output, StreamEvent::HasSpaceAvailable)?;
        }
        Ok(collected)
    }

    /// Send everything written by the local side straight back to it
    pub fn echo(&self) -> RuntimeResult<usize> {
        let collected = self.collect()?;
        if !collected.is_empty() {
            self.inject(&collected)?;
        }
        Ok(collected.len())
    }

    /// Bytes written by the local side and not yet collected
    pub fn pending_outbound(&self) -> usize {
        lock(&self.link).outbound.len()
    }

    /// Make the next local write fail with `reason`
    pub fn fail_next_write(&self, reason: impl Into<String>) {
        lock(&self.link).write_failure = Some(reason.into());
    }

    /// Make the next local read fail with `reason`
    pub fn fail_next_read(&self, reason: impl Into<String>) {
        lock(&self.link).read_failure = Some(reason.into());
    }

    /// Close the remote side
    pub fn end(&self) -> RuntimeResult<()> {
        lock(&self.link).ended = true;
        self.notify(Endpoint::Input, StreamEvent::EndEncountered)
    }

    /// Whether the local side has closed both endpoints
    pub fn local_closed(&self) -> bool {
        lock(&self.link).endpoints_closed >= 2
    }

    /// Deliver an arbitrary notification for this channel
    pub fn notify(&self, endpoint: Endpoint, event: StreamEvent) -> RuntimeResult<()> {
        self.sink.notify(self.handle, endpoint, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(window: usize, capacity: usize) -> SharedLink {
        Arc::new(Mutex::new(LinkState {
            write_window: window,
            capacity,
            ..LinkState::default()
        }))
    }

    #[test]
    fn test_output_respects_window_and_capacity() {
        let shared = link(3, 5);
        let mut output = SimOutput {
            link: shared.clone(),
        };

        assert_eq!(output.write(b"ABCDEFG").unwrap(), 3);
        assert_eq!(output.write(b"DEFG").unwrap(), 2);
        assert!(!output.has_space_available());
        assert_eq!(output.write(b"G").unwrap(), 0);
        assert_eq!(
            lock(&shared).outbound.iter().copied().collect::<Vec<_>>(),
            b"ABCDE"
        );
    }

    #[test]
    fn test_input_reads_injected_bytes() {
        let shared = link(8, 8);
        lock(&shared).inbound.extend(b"hello");
        let mut input = SimInput { link: shared };

        let mut buf = [0u8; 3];
        assert!(input.has_bytes_available());
        assert_eq!(input.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(input.read(&mut buf).unwrap(), 2);
        assert!(!input.has_bytes_available());
    }

    #[test]
    fn test_injected_failures_fire_once() {
        let shared = link(8, 8);
        lock(&shared).write_failure = Some("radio off".into());
        let mut output = SimOutput { link: shared };

        assert!(matches!(output.write(b"x"), Err(StreamError::Other(_))));
        assert_eq!(output.write(b"x").unwrap(), 1);
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = LinkConfig::default().with_write_window(0);
        assert!(config.validate().is_err());
    }
}
