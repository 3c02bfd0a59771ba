//! Read-until-drained input loop

use tracing::{debug, warn};

use crate::error::Result;
use crate::stream::ReadableStream;

/// Summary of one bytes-available cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Chunks handed to the sink
    pub chunks: usize,
    /// Total bytes handed to the sink
    pub bytes: usize,
    /// The cycle ended on a zero-length read while bytes were reported available
    pub empty_read: bool,
}

/// Drains a readable stream into a chunk sink
///
/// Reads go through a fixed scratch buffer; every chunk handed to the sink is
/// a fresh copy, so the sink owns what it receives.
#[derive(Debug)]
pub struct StreamReader {
    scratch: Vec<u8>,
}

impl StreamReader {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            scratch: vec![0; chunk_size.max(1)],
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.scratch.len()
    }

    /// Read everything the stream reports as available
    ///
    /// Stops when the stream reports nothing more, when a read returns zero
    /// bytes, or on the first read error. Chunks delivered before an error
    /// stay delivered.
    pub fn read_available<R, F>(&mut self, input: &mut R, mut sink: F) -> Result<ReadOutcome>
    where
        R: ReadableStream + ?Sized,
        F: FnMut(Vec<u8>),
    {
        let mut outcome = ReadOutcome::default();

        while input.has_bytes_available() {
            let count = input
                .read(&mut self.scratch)
                .map_err(|e| e.into_read_error())?;

            if count == 0 {
                warn!(
                    chunks = outcome.chunks,
                    "stream reported bytes available but read returned none"
                );
                outcome.empty_read = true;
                break;
            }

            let count = if count > self.scratch.len() {
                warn!(
                    count,
                    capacity = self.scratch.len(),
                    "stream reported more bytes than the read buffer holds"
                );
                self.scratch.len()
            } else {
                count
            };
            outcome.chunks += 1;
            outcome.bytes += count;
            sink(self.scratch[..count].to_vec());
        }

        debug!(chunks = outcome.chunks, bytes = outcome.bytes, "input drained");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ChannelError, StreamError};
    use crate::stream::mock::MockInput;

    #[test]
    fn test_loop_stops_when_availability_ends() {
        let mut reader = StreamReader::new(1024);
        let mut input = MockInput::new();
        input.queue(&[7u8; 15]);
        input.script_read_sizes(&[10, 5]);
        input.script_availability(&[true, true, false]);

        let mut chunks = Vec::new();
        let outcome = reader
            .read_available(&mut input, |chunk| chunks.push(chunk))
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 10);
        assert_eq!(chunks[1].len(), 5);
        assert_eq!(input.read_calls(), 2);
        assert_eq!(outcome.bytes, 15);
        assert!(!outcome.empty_read);
    }

    #[test]
    fn test_chunks_follow_read_order() {
        let mut reader = StreamReader::new(4);
        let mut input = MockInput::new();
        input.queue(b"abcdefghij");

        let mut chunks = Vec::new();
        reader
            .read_available(&mut input, |chunk| chunks.push(chunk))
            .unwrap();

        assert_eq!(
            chunks,
            vec![b"abcd".to_vec(), b"efgh".to_vec(), b"ij".to_vec()]
        );
    }

    #[test]
    fn test_overreported_read_is_clamped() {
        let mut reader = StreamReader::new(4);
        let mut input = MockInput::new();
        input.queue(b"abcd");
        input.set_overreport(3);
        input.script_availability(&[true, false]);

        let mut chunks = Vec::new();
        let outcome = reader
            .read_available(&mut input, |chunk| chunks.push(chunk))
            .unwrap();

        assert_eq!(chunks, vec![b"abcd".to_vec()]);
        assert_eq!(outcome.bytes, 4);
    }

    #[test]
    fn test_zero_read_is_terminal() {
        let mut reader = StreamReader::new(16);
        let mut input = MockInput::new();
        input.set_force_available(true);

        let mut delivered = 0;
        let outcome = reader
            .read_available(&mut input, |_| delivered += 1)
            .unwrap();

        assert!(outcome.empty_read);
        assert_eq!(delivered, 0);
        assert_eq!(input.read_calls(), 1);
    }

    #[test]
    fn test_read_error_stops_loop() {
        let mut reader = StreamReader::new(16);
        let mut input = MockInput::new();
        input.queue(b"data");
        input.fail_next_read(StreamError::Closed);

        let mut delivered = 0;
        let result = reader.read_available(&mut input, |_| delivered += 1);

        assert!(matches!(
            result,
            Err(ChannelError::TransportReadError { .. })
        ));
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_nothing_available_reads_nothing() {
        let mut reader = StreamReader::new(16);
        let mut input = MockInput::new();

        let outcome = reader.read_available(&mut input, |_| {}).unwrap();

        assert_eq!(outcome, ReadOutcome::default());
        assert_eq!(input.read_calls(), 0);
    }
}
