//! Outbound byte buffer

/// Ordered bytes awaiting transmission
///
/// Bytes leave strictly from the front and arrive strictly at the tail. The
/// consumed prefix is tracked with an offset and reclaimed lazily, so a short
/// write does not shift the remaining bytes every time.
#[derive(Debug, Default, Clone)]
pub struct OutboundBuffer {
    data: Vec<u8>,
    head: usize,
}

impl OutboundBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes to the tail
    pub fn append(&mut self, bytes: &[u8]) {
        if self.head == self.data.len() {
            self.data.clear();
            self.head = 0;
        }
        self.data.extend_from_slice(bytes);
    }

    /// Pending bytes, front first
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.head..]
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove `count` bytes from the front
    ///
    /// `count` is clamped to the pending length.
    pub fn consume(&mut self, count: usize) {
        let count = count.min(self.len());
        self.head += count;

        if self.head == self.data.len() {
            self.data.clear();
            self.head = 0;
        } else if self.head > self.data.len() / 2 {
            self.data.drain(..self.head);
            self.head = 0;
        }
    }

    /// Drop everything pending, returning how many bytes were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.len();
        self.data.clear();
        self.head = 0;
        dropped
    }
}
