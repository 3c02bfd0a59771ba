//! Stream endpoint abstraction
//!
//! An L2CAP channel is exposed by the platform as two half-duplex byte streams
//! that report readiness through notifications. These traits describe the
//! primitives the core needs from each half, so the same writer and reader
//! logic runs against a platform channel, the simulated link, or a test mock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::StreamError;

// ----------------------------------------------------------------------------
// Endpoint Traits
// ----------------------------------------------------------------------------

/// The readable half of a channel
pub trait ReadableStream {
    /// Whether a read would currently return data without blocking
    fn has_bytes_available(&self) -> bool;

    /// Read up to `buf.len()` bytes, returning how many were read
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError>;

    /// Start delivering readiness notifications
    fn open(&mut self) {}

    /// Stop delivering notifications and release the endpoint
    fn close(&mut self) {}
}

/// The writable half of a channel
pub trait WritableStream {
    /// Whether a write would currently accept at least one byte
    fn has_space_available(&self) -> bool;

    /// Write a prefix of `data`, returning how many bytes were accepted
    fn write(&mut self, data: &[u8]) -> Result<usize, StreamError>;

    /// Start delivering readiness notifications
    fn open(&mut self) {}

    /// Stop delivering notifications and release the endpoint
    fn close(&mut self) {}
}

impl<T: ReadableStream + ?Sized> ReadableStream for Box<T> {
    fn has_bytes_available(&self) -> bool {
        (**self).has_bytes_available()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        (**self).read(buf)
    }

    fn open(&mut self) {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

impl<T: WritableStream + ?Sized> WritableStream for Box<T> {
    fn has_space_available(&self) -> bool {
        (**self).has_space_available()
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, StreamError> {
        (**self).write(data)
    }

    fn open(&mut self) {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

// ----------------------------------------------------------------------------
// Readiness Events
// ----------------------------------------------------------------------------

/// Which half of the channel a notification refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    Input,
    Output,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Input => write!(f, "input"),
            Endpoint::Output => write!(f, "output"),
        }
    }
}

/// Readiness notification delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamEvent {
    OpenCompleted,
    HasBytesAvailable,
    HasSpaceAvailable,
    EndEncountered,
    ErrorOccurred(String),
}

// ----------------------------------------------------------------------------
// Channel Handle
// ----------------------------------------------------------------------------

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one established channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(u64);

impl HandleId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The pair of endpoints of one established channel
pub struct ChannelHandle<R, W> {
    id: HandleId,
    input: R,
    output: W,
}

impl<R, W> ChannelHandle<R, W> {
    /// Wrap freshly opened endpoints under a new id
    pub fn new(input: R, output: W) -> Self {
        Self {
            id: HandleId::next(),
            input,
            output,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn input_mut(&mut self) -> &mut R {
        &mut self.input
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.output
    }

    pub fn into_parts(self) -> (R, W) {
        (self.input, self.output)
    }
}

impl<R: ReadableStream, W: WritableStream> ChannelHandle<R, W> {
    pub(crate) fn open(&mut self) {
        self.input.open();
        self.output.open();
    }

    pub(crate) fn close(&mut self) {
        self.input.close();
        self.output.close();
    }
}

impl<R, W> fmt::Debug for ChannelHandle<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
pub mod mock {
    //! Scriptable stream endpoints for unit tests
    //!
    //! Clones share state, so a test can keep one copy for inspection after
    //! handing the other to a coordinator.

    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct InputState {
        pending: VecDeque<u8>,
        read_sizes: VecDeque<usize>,
        availability: VecDeque<bool>,
        force_available: bool,
        next_error: Option<StreamError>,
        overreport: usize,
        reads: usize,
        opened: bool,
        closed: bool,
    }

    /// Mock readable endpoint
    #[derive(Clone, Default)]
    pub struct MockInput {
        state: Rc<RefCell<InputState>>,
    }

    impl MockInput {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue bytes to be returned by `read`
        pub fn queue(&self, data: &[u8]) {
            self.state.borrow_mut().pending.extend(data.iter().copied());
        }

        /// Cap the size of upcoming reads, one entry per call
        pub fn script_read_sizes(&self, sizes: &[usize]) {
            self.state.borrow_mut().read_sizes.extend(sizes.iter().copied());
        }

        /// Script the answers of upcoming `has_bytes_available` polls
        pub fn script_availability(&self, answers: &[bool]) {
            self.state.borrow_mut().availability.extend(answers.iter().copied());
        }

        /// Report bytes available even when nothing is queued
        pub fn set_force_available(&self, value: bool) {
            self.state.borrow_mut().force_available = value;
        }

        /// Fail the next `read`
        pub fn fail_next_read(&self, error: StreamError) {
            self.state.borrow_mut().next_error = Some(error);
        }

        /// Report `extra` more bytes than were actually read
        pub fn set_overreport(&self, extra: usize) {
            self.state.borrow_mut().overreport = extra;
        }

        pub fn read_calls(&self) -> usize {
            self.state.borrow().reads
        }

        pub fn is_opened(&self) -> bool {
            self.state.borrow().opened
        }

        pub fn is_closed(&self) -> bool {
            self.state.borrow().closed
        }
    }

    impl ReadableStream for MockInput {
        fn has_bytes_available(&self) -> bool {
            let mut state = self.state.borrow_mut();
            if let Some(answer) = state.availability.pop_front() {
                return answer;
            }
            state.force_available || !state.pending.is_empty()
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
            let mut state = self.state.borrow_mut();
            state.reads += 1;
            if let Some(error) = state.next_error.take() {
                return Err(error);
            }

            let mut count = buf.len().min(state.pending.len());
            if let Some(limit) = state.read_sizes.pop_front() {
                count = count.min(limit);
            }
            for slot in buf.iter_mut().take(count) {
                // count never exceeds the queue length
                *slot = state.pending.pop_front().unwrap_or_default();
            }
            Ok(count + state.overreport)
        }

        fn open(&mut self) {
            self.state.borrow_mut().opened = true;
        }

        fn close(&mut self) {
            self.state.borrow_mut().closed = true;
        }
    }

    struct OutputState {
        written: Vec<u8>,
        calls: Vec<Vec<u8>>,
        window: Option<usize>,
        space: bool,
        next_error: Option<StreamError>,
        overreport: usize,
        opened: bool,
        closed: bool,
    }

    /// Mock writable endpoint
    #[derive(Clone)]
    pub struct MockOutput {
        state: Rc<RefCell<OutputState>>,
    }

    impl Default for MockOutput {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockOutput {
        /// Output that accepts everything and always has space
        pub fn new() -> Self {
            Self {
                state: Rc::new(RefCell::new(OutputState {
                    written: Vec::new(),
                    calls: Vec::new(),
                    window: None,
                    space: true,
                    next_error: None,
                    overreport: 0,
                    opened: false,
                    closed: false,
                })),
            }
        }

        /// Output that accepts at most `window` bytes per write
        pub fn with_window(window: usize) -> Self {
            let output = Self::new();
            output.state.borrow_mut().window = Some(window);
            output
        }

        pub fn set_space_available(&self, value: bool) {
            self.state.borrow_mut().space = value;
        }

        pub fn set_window(&self, window: Option<usize>) {
            self.state.borrow_mut().window = window;
        }

        /// Fail the next `write`
        pub fn fail_next_write(&self, error: StreamError) {
            self.state.borrow_mut().next_error = Some(error);
        }

        /// Report `extra` more bytes than were actually accepted
        pub fn set_overreport(&self, extra: usize) {
            self.state.borrow_mut().overreport = extra;
        }

        /// Every byte accepted so far
        pub fn written(&self) -> Vec<u8> {
            self.state.borrow().written.clone()
        }

        /// The slice offered to each `write` call
        pub fn write_calls(&self) -> Vec<Vec<u8>> {
            self.state.borrow().calls.clone()
        }

        pub fn is_opened(&self) -> bool {
            self.state.borrow().opened
        }

        pub fn is_closed(&self) -> bool {
            self.state.borrow().closed
        }
    }

    impl WritableStream for MockOutput {
        fn has_space_available(&self) -> bool {
            self.state.borrow().space
        }

        fn write(&mut self, data: &[u8]) -> Result<usize, StreamError> {
            let mut state = self.state.borrow_mut();
            state.calls.push(data.to_vec());
            if let Some(error) = state.next_error.take() {
                return Err(error);
            }

            let accepted = state.window.map_or(data.len(), |w| w.min(data.len()));
            state.written.extend_from_slice(&data[..accepted]);
            Ok(accepted + state.overreport)
        }

        fn open(&mut self) {
            self.state.borrow_mut().opened = true;
        }

        fn close(&mut self) {
            self.state.borrow_mut().closed = true;
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_mock_partial_read() {
            let mut input = MockInput::new();
            input.queue(&[1, 2, 3, 4, 5]);

            let mut buf = [0u8; 2];
            assert_eq!(input.read(&mut buf).unwrap(), 2);
            assert_eq!(buf, [1, 2]);

            let mut buf = [0u8; 10];
            assert_eq!(input.read(&mut buf).unwrap(), 3);
            assert_eq!(&buf[..3], &[3, 4, 5]);
            assert!(!input.has_bytes_available());
        }

        #[test]
        fn test_mock_window_limits_write() {
            let mut output = MockOutput::with_window(2);
            assert_eq!(output.write(b"ABCDE").unwrap(), 2);
            assert_eq!(output.written(), b"AB");
            assert_eq!(output.write_calls(), vec![b"ABCDE".to_vec()]);
        }

        #[test]
        fn test_mock_write_error_is_cleared() {
            let mut output = MockOutput::new();
            output.fail_next_write(StreamError::Closed);
            assert!(output.write(b"A").is_err());
            assert_eq!(output.write(b"A").unwrap(), 1);
        }
    }
}
