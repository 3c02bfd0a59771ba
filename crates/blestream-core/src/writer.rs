//! Flow-controlled output draining

use tracing::{debug, trace, warn};

use crate::buffer::OutboundBuffer;
use crate::error::Result;
use crate::stream::WritableStream;

/// What a single drain attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Nothing was pending
    Empty,
    /// The stream reported no space, nothing was written
    NoSpace,
    /// The stream accepted `written` bytes and `remaining` are still pending
    Partial { written: usize, remaining: usize },
    /// Everything pending was accepted
    Complete { written: usize },
}

impl DrainOutcome {
    /// Bytes handed to the transport by this attempt
    pub fn written(&self) -> usize {
        match self {
            DrainOutcome::Partial { written, .. } | DrainOutcome::Complete { written } => *written,
            DrainOutcome::Empty | DrainOutcome::NoSpace => 0,
        }
    }
}

/// Owns the outbound buffer and drains it against a writable stream
///
/// The writer never polls. A drain happens when the owner appends data or when
/// the transport reports that space became available, and each drain issues
/// at most one `write` call.
#[derive(Debug)]
pub struct FlowControlledWriter {
    buffer: OutboundBuffer,
    warn_threshold: usize,
    above_threshold: bool,
}

impl FlowControlledWriter {
    pub fn new(warn_threshold: usize) -> Self {
        Self {
            buffer: OutboundBuffer::new(),
            warn_threshold,
            above_threshold: false,
        }
    }

    /// Append bytes to the tail of the pending buffer
    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.append(bytes);
        self.check_threshold();
    }

    /// Append bytes and attempt an immediate drain
    pub fn enqueue<W: WritableStream + ?Sized>(
        &mut self,
        bytes: &[u8],
        output: &mut W,
    ) -> Result<DrainOutcome> {
        self.append(bytes);
        self.drain(output)
    }

    /// Write as much of the pending buffer as the stream accepts in one call
    ///
    /// On error the buffer is left exactly as it was.
    pub fn drain<W: WritableStream + ?Sized>(&mut self, output: &mut W) -> Result<DrainOutcome> {
        if self.buffer.is_empty() {
            return Ok(DrainOutcome::Empty);
        }
        if !output.has_space_available() {
            trace!(pending = self.buffer.len(), "output has no space, deferring drain");
            return Ok(DrainOutcome::NoSpace);
        }

        let pending = self.buffer.len();
        let mut written = output
            .write(self.buffer.as_slice())
            .map_err(|e| e.into_write_error())?;

        if written > pending {
            warn!(written, pending, "transport reported more bytes than offered");
            written = pending;
        }

        self.buffer.consume(written);
        self.check_threshold();

        let remaining = self.buffer.len();
        debug!(written, remaining, "drained output buffer");

        if remaining == 0 {
            Ok(DrainOutcome::Complete { written })
        } else {
            Ok(DrainOutcome::Partial { written, remaining })
        }
    }

    /// Pending bytes, front first
    pub fn pending(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop all pending bytes, returning how many were dropped
    pub fn discard(&mut self) -> usize {
        self.above_threshold = false;
        self.buffer.clear()
    }

    /// Warn once per upward crossing of the high-water mark
    ///
    /// Returns `true` when this call crossed it. Dropping back to or below
    /// the mark re-arms the warning.
    fn check_threshold(&mut self) -> bool {
        let above = self.buffer.len() > self.warn_threshold;
        let crossed = above && !self.above_threshold;
        if crossed {
            warn!(
                pending = self.buffer.len(),
                threshold = self.warn_threshold,
                "outbound buffer above high-water mark"
            );
        }
        self.above_threshold = above;
        crossed
    }
}
