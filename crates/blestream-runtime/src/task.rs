//! Connection task: the single execution context of one channel
//!
//! A [`ConnectionTask`] owns a [`ChannelCoordinator`] and processes everything
//! that touches it from one queue: sends handed off by application code,
//! and channel-open and readiness events from the transport. Callers on other
//! threads only ever hold a [`ConnectionHandle`] or a [`TransportEventSink`],
//! both of which just push onto that queue.

use blestream_core::{
    ChannelCoordinator, ChannelError, ChannelHandle, ChannelObserver, ConnectionState, Endpoint,
    HandleId, ReadableStream, StreamEvent, WritableStream,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};

/// Readable endpoint as carried across threads
pub type BoxedInput = Box<dyn ReadableStream + Send>;

/// Writable endpoint as carried across threads
pub type BoxedOutput = Box<dyn WritableStream + Send>;

/// Channel handle type used by the runtime
pub type RuntimeChannel = ChannelHandle<BoxedInput, BoxedOutput>;

// ----------------------------------------------------------------------------
// Channel Events
// ----------------------------------------------------------------------------

/// Everything a connection reports to the application, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    StateChanged(ConnectionState),
    DataReceived(Vec<u8>),
    TransportError(ChannelError),
}

/// Work items processed by the connection task
pub(crate) enum ConnectionCommand {
    Send(Vec<u8>),
    BeginNegotiation,
    ChannelOpened(Result<RuntimeChannel, String>),
    Stream {
        handle: HandleId,
        endpoint: Endpoint,
        event: StreamEvent,
    },
    Teardown,
    Shutdown,
}

/// Observer that forwards coordinator output to the application
struct EventForwarder {
    events: mpsc::UnboundedSender<ChannelEvent>,
    state: watch::Sender<ConnectionState>,
}

impl EventForwarder {
    fn emit(&self, event: ChannelEvent) {
        if self.events.send(event).is_err() {
            debug!("channel event receiver dropped");
        }
    }
}

impl ChannelObserver for EventForwarder {
    fn on_data_received(&mut self, chunk: Vec<u8>) {
        self.emit(ChannelEvent::DataReceived(chunk));
    }

    fn on_transport_error(&mut self, error: &ChannelError) {
        self.emit(ChannelEvent::TransportError(error.clone()));
    }

    fn on_state_changed(&mut self, state: ConnectionState) {
        self.state.send_replace(state);
        self.emit(ChannelEvent::StateChanged(state));
    }
}

// ----------------------------------------------------------------------------
// Handles
// ----------------------------------------------------------------------------

/// Application-side handle to a connection
///
/// Cheap to clone and safe to use from any thread. `send` never blocks: it
/// enqueues the bytes for the connection task and returns.
#[derive(Clone)]
pub struct ConnectionHandle {
    peripheral: Uuid,
    commands: mpsc::UnboundedSender<ConnectionCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    pub fn peripheral(&self) -> Uuid {
        self.peripheral
    }

    /// Last state published by the connection task
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Hand bytes off to the connection task for transmission
    ///
    /// Rejected with `NotConnected` unless the channel is open. A send that
    /// races with the channel closing is rejected by the task instead and
    /// reported as a [`ChannelEvent::TransportError`].
    pub fn send(&self, bytes: impl Into<Vec<u8>>) -> RuntimeResult<()> {
        if !self.is_open() {
            return Err(ChannelError::NotConnected.into());
        }
        self.push(ConnectionCommand::Send(bytes.into()))
    }

    /// Close the live channel, keeping the task alive for a reconnect
    pub fn teardown(&self) -> RuntimeResult<()> {
        self.push(ConnectionCommand::Teardown)
    }

    /// Close the channel and stop the task
    pub fn shutdown(&self) -> RuntimeResult<()> {
        self.push(ConnectionCommand::Shutdown)
    }

    /// Wait until the published state satisfies `predicate`
    pub async fn wait_for_state<F>(&self, predicate: F) -> RuntimeResult<ConnectionState>
    where
        F: Fn(&ConnectionState) -> bool,
    {
        let mut state = self.state.clone();
        loop {
            let current = *state.borrow_and_update();
            if predicate(&current) {
                return Ok(current);
            }
            state.changed().await.map_err(|_| RuntimeError::TaskStopped)?;
        }
    }

    fn push(&self, command: ConnectionCommand) -> RuntimeResult<()> {
        self.commands
            .send(command)
            .map_err(|_| RuntimeError::TaskStopped)
    }
}

/// Transport-side handle used to deliver channel and readiness events
#[derive(Clone)]
pub struct TransportEventSink {
    commands: mpsc::UnboundedSender<ConnectionCommand>,
}

impl TransportEventSink {
    /// PSM negotiation has started
    pub fn begin_negotiation(&self) -> RuntimeResult<()> {
        self.push(ConnectionCommand::BeginNegotiation)
    }

    /// The platform finished (or failed) opening the channel
    pub fn channel_opened(&self, result: Result<RuntimeChannel, String>) -> RuntimeResult<()> {
        self.push(ConnectionCommand::ChannelOpened(result))
    }

    /// A readiness notification for one endpoint of `handle`
    pub fn notify(&self, handle: HandleId, endpoint: Endpoint, event: StreamEvent) -> RuntimeResult<()> {
        self.push(ConnectionCommand::Stream {
            handle,
            endpoint,
            event,
        })
    }

    fn push(&self, command: ConnectionCommand) -> RuntimeResult<()> {
        self.commands
            .send(command)
            .map_err(|_| RuntimeError::TaskStopped)
    }
}

/// Everything handed back when a connection task is created
pub struct ConnectionParts {
    pub handle: ConnectionHandle,
    pub transport: TransportEventSink,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
}

// ----------------------------------------------------------------------------
// Connection Task
// ----------------------------------------------------------------------------

/// Owns one channel coordinator and processes its queue
pub struct ConnectionTask {
    peripheral: Uuid,
    coordinator: ChannelCoordinator<BoxedInput, BoxedOutput, EventForwarder>,
    commands: mpsc::UnboundedReceiver<ConnectionCommand>,
}

impl ConnectionTask {
    /// Create a task and the handles that feed it
    pub fn new(peripheral: Uuid, config: &RuntimeConfig) -> RuntimeResult<(Self, ConnectionParts)> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        let forwarder = EventForwarder {
            events: event_tx,
            state: state_tx,
        };
        let coordinator = ChannelCoordinator::new(&config.channel, forwarder)?;

        let task = Self {
            peripheral,
            coordinator,
            commands: command_rx,
        };
        let parts = ConnectionParts {
            handle: ConnectionHandle {
                peripheral,
                commands: command_tx.clone(),
                state: state_rx,
            },
            transport: TransportEventSink {
                commands: command_tx,
            },
            events: event_rx,
        };
        Ok((task, parts))
    }

    /// Create a task and spawn it on the current tokio runtime
    pub fn spawn(
        peripheral: Uuid,
        config: &RuntimeConfig,
    ) -> RuntimeResult<(ConnectionParts, JoinHandle<()>)> {
        let (task, parts) = Self::new(peripheral, config)?;
        let join = tokio::spawn(task.run());
        Ok((parts, join))
    }

    /// Process the queue until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!(peripheral = %self.peripheral, "connection task starting");

        while let Some(command) = self.commands.recv().await {
            if !self.process(command) {
                break;
            }
        }

        self.coordinator.teardown();
        info!(
            peripheral = %self.peripheral,
            stats = ?self.coordinator.stats(),
            "connection task stopped"
        );
    }

    /// Apply one command, returning `false` when the task should stop
    fn process(&mut self, command: ConnectionCommand) -> bool {
        match command {
            ConnectionCommand::Send(bytes) => {
                if let Err(err) = self.coordinator.send(&bytes) {
                    warn!(peripheral = %self.peripheral, error = %err, "send rejected");
                    self.coordinator.observer_mut().on_transport_error(&err);
                }
            }
            ConnectionCommand::BeginNegotiation => {
                if let Err(err) = self.coordinator.begin_negotiation() {
                    warn!(peripheral = %self.peripheral, error = %err, "negotiation not started");
                }
            }
            ConnectionCommand::ChannelOpened(result) => {
                // negotiation failures already reach the application through the observer
                if let Err(err) = self.coordinator.channel_opened(result) {
                    debug!(peripheral = %self.peripheral, error = %err, "channel not opened");
                }
            }
            ConnectionCommand::Stream {
                handle,
                endpoint,
                event,
            } => self.coordinator.handle_event(handle, endpoint, event),
            ConnectionCommand::Teardown => self.coordinator.teardown(),
            ConnectionCommand::Shutdown => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_send_rejected_while_idle() {
        let (parts, _join) = ConnectionTask::spawn(Uuid::new_v4(), &RuntimeConfig::testing()).unwrap();

        let result = parts.handle.send(b"hello".to_vec());

        assert!(result.unwrap_err().is_not_connected());
        assert_eq!(parts.handle.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_negotiation_failure_is_reported() {
        let (mut parts, _join) =
            ConnectionTask::spawn(Uuid::new_v4(), &RuntimeConfig::testing()).unwrap();

        assert_ok!(parts.transport.begin_negotiation());
        assert_ok!(parts
            .transport
            .channel_opened(Err("PSM characteristic missing".into())));

        assert_eq!(
            parts.events.recv().await,
            Some(ChannelEvent::StateChanged(ConnectionState::Negotiating))
        );
        assert_eq!(
            parts.events.recv().await,
            Some(ChannelEvent::TransportError(ChannelError::NegotiationFailed {
                reason: "PSM characteristic missing".into()
            }))
        );
        let state = parts
            .handle
            .wait_for_state(|s| s.is_closed())
            .await
            .unwrap();
        assert!(state.is_failed());
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let (parts, join) = ConnectionTask::spawn(Uuid::new_v4(), &RuntimeConfig::testing()).unwrap();

        assert_ok!(parts.handle.shutdown());
        join.await.unwrap();

        assert_eq!(parts.handle.teardown(), Err(RuntimeError::TaskStopped));
        assert_err!(parts.transport.begin_negotiation());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RuntimeConfig::testing().with_max_connections(0);
        assert!(ConnectionTask::new(Uuid::new_v4(), &config).is_err());
    }
}
