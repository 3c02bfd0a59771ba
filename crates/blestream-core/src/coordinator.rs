//! Channel coordinator state machine
//!
//! The coordinator owns the live channel handle together with the writer and
//! reader that operate on it. The transport drives it with a "channel opened"
//! event followed by per-endpoint readiness events; the owner drives it with
//! `send` and `teardown`. Results flow back out through a [`ChannelObserver`].
//!
//! All methods take `&mut self`, so a coordinator lives on exactly one
//! execution context. Cross-thread callers go through a hand-off queue (see
//! the runtime crate), never through shared access to the coordinator.

use tracing::{debug, error, info, trace, warn};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::reader::StreamReader;
use crate::state::{ChannelStats, CloseReason, ConnectionState};
use crate::stream::{ChannelHandle, Endpoint, HandleId, ReadableStream, StreamEvent, WritableStream};
use crate::writer::{DrainOutcome, FlowControlledWriter};

// ----------------------------------------------------------------------------
// Observer
// ----------------------------------------------------------------------------

/// Receives everything the coordinator reports to its owner
pub trait ChannelObserver {
    /// An inbound chunk, in the order it was read
    fn on_data_received(&mut self, chunk: Vec<u8>);

    /// A transport failure, negotiation failure, or discarded output
    fn on_transport_error(&mut self, error: &ChannelError);

    /// The connection state changed
    fn on_state_changed(&mut self, _state: ConnectionState) {}
}

// ----------------------------------------------------------------------------
// Coordinator
// ----------------------------------------------------------------------------

/// Drives one L2CAP channel from open to close
pub struct ChannelCoordinator<R, W, O> {
    state: ConnectionState,
    handle: Option<ChannelHandle<R, W>>,
    writer: FlowControlledWriter,
    reader: StreamReader,
    observer: O,
    stats: ChannelStats,
}

impl<R, W, O> ChannelCoordinator<R, W, O>
where
    R: ReadableStream,
    W: WritableStream,
    O: ChannelObserver,
{
    /// Create an idle coordinator
    pub fn new(config: &ChannelConfig, observer: O) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: ConnectionState::Idle,
            handle: None,
            writer: FlowControlledWriter::new(config.buffer_warn_bytes),
            reader: StreamReader::new(config.read_chunk_size),
            observer,
            stats: ChannelStats::default(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Id of the live handle, if any
    pub fn handle_id(&self) -> Option<HandleId> {
        self.handle.as_ref().map(ChannelHandle::id)
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    /// Bytes accepted by `send` but not yet written
    pub fn pending_output(&self) -> usize {
        self.writer.pending_len()
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Record that PSM negotiation has started
    pub fn begin_negotiation(&mut self) -> Result<()> {
        if self.state.is_open() {
            return Err(ChannelError::AlreadyOpen);
        }
        self.set_state(ConnectionState::Negotiating);
        Ok(())
    }

    /// Handle the transport's "channel opened" event
    ///
    /// On success the coordinator takes the handle, opens both endpoints and
    /// becomes `Open`. A negotiation error moves it to `Closed` and is also
    /// reported to the observer. While a channel is open, both a new handle
    /// and a late negotiation error are rejected and the live channel stays.
    pub fn channel_opened(
        &mut self,
        result: std::result::Result<ChannelHandle<R, W>, String>,
    ) -> Result<HandleId> {
        let mut handle = match result {
            Ok(handle) => handle,
            Err(reason) if self.state.is_open() => {
                warn!(
                    %reason,
                    live = ?self.handle_id(),
                    "negotiation failure while channel open, keeping live channel"
                );
                return Err(ChannelError::NegotiationFailed { reason });
            }
            Err(reason) => {
                error!(%reason, "L2CAP channel negotiation failed");
                let err = ChannelError::NegotiationFailed { reason };
                self.observer.on_transport_error(&err);
                self.set_state(ConnectionState::Closed(CloseReason::NegotiationFailed));
                return Err(err);
            }
        };

        if !self.state.accepts_channel() {
            warn!(
                offered = %handle.id(),
                live = ?self.handle_id(),
                "channel already open, rejecting new handle"
            );
            handle.close();
            return Err(ChannelError::AlreadyOpen);
        }

        let id = handle.id();
        handle.open();
        self.handle = Some(handle);
        self.stats = ChannelStats::default();
        info!(handle = %id, "L2CAP channel opened");
        self.set_state(ConnectionState::Open);
        Ok(id)
    }

    /// Queue bytes for transmission and try to write them right away
    ///
    /// Only fails with `NotConnected`; transport failures during the
    /// immediate drain go to the observer and close the channel.
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.state.is_open() {
            debug!(state = %self.state, len = bytes.len(), "rejecting send");
            return Err(ChannelError::NotConnected);
        }

        trace!(len = bytes.len(), "queueing outbound bytes");
        self.writer.append(bytes);
        self.drain_output();
        Ok(())
    }

    /// Handle a readiness notification from one of the endpoints
    ///
    /// Notifications for any handle other than the live one are dropped.
    pub fn handle_event(&mut self, id: HandleId, endpoint: Endpoint, event: StreamEvent) {
        if !self.state.is_open() || self.handle_id() != Some(id) {
            trace!(handle = %id, %endpoint, ?event, "dropping stale stream event");
            return;
        }

        match (endpoint, event) {
            (_, StreamEvent::OpenCompleted) => {
                debug!(handle = %id, %endpoint, "stream opened");
                if endpoint == Endpoint::Output {
                    self.drain_output();
                }
            }
            (Endpoint::Output, StreamEvent::HasSpaceAvailable) => self.drain_output(),
            (Endpoint::Input, StreamEvent::HasBytesAvailable) => self.read_input(),
            (_, StreamEvent::EndEncountered) => {
                info!(handle = %id, %endpoint, "stream end encountered");
                self.close(CloseReason::EndOfStream);
            }
            (Endpoint::Input, StreamEvent::ErrorOccurred(reason)) => {
                self.fail(ChannelError::TransportReadError { reason });
            }
            (Endpoint::Output, StreamEvent::ErrorOccurred(reason)) => {
                self.fail(ChannelError::TransportWriteError { reason });
            }
            (endpoint, event) => {
                debug!(handle = %id, %endpoint, ?event, "ignoring event for wrong endpoint");
            }
        }
    }

    /// Close the live channel on the owner's request
    pub fn teardown(&mut self) {
        if self.handle.is_some() {
            self.close(CloseReason::LocalTeardown);
        }
    }

    fn drain_output(&mut self) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };

        match self.writer.drain(handle.output_mut()) {
            Ok(outcome) => {
                self.stats.bytes_written += outcome.written() as u64;
                if let DrainOutcome::Partial { .. } = outcome {
                    self.stats.short_writes += 1;
                }
            }
            Err(err) => self.fail(err),
        }
    }

    fn read_input(&mut self) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };

        let observer = &mut self.observer;
        let stats = &mut self.stats;
        let result = self.reader.read_available(handle.input_mut(), |chunk| {
            stats.bytes_received += chunk.len() as u64;
            stats.chunks_delivered += 1;
            observer.on_data_received(chunk);
        });

        match result {
            Ok(outcome) if outcome.empty_read => self.stats.empty_reads += 1,
            Ok(_) => {}
            Err(err) => self.fail(err),
        }
    }

    fn fail(&mut self, err: ChannelError) {
        error!(error = %err, "transport failure");
        self.observer.on_transport_error(&err);
        self.close(CloseReason::TransportError);
    }

    fn close(&mut self, reason: CloseReason) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
            info!(handle = %handle.id(), ?reason, "L2CAP channel closed");
        }

        let discarded = self.writer.discard();
        if discarded > 0 {
            warn!(discarded, "discarding undrained output");
            self.observer
                .on_transport_error(&ChannelError::SendIncomplete { discarded });
        }

        self.set_state(ConnectionState::Closed(reason));
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            trace!(from = %self.state, to = %state, "connection state change");
            self.state = state;
            self.observer.on_state_changed(state);
        }
    }
}
