//! Channel configuration

use serde::{Deserialize, Serialize};

use crate::error::{ChannelError, Result};

/// Default size of the scratch buffer used for each bounded read
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Default pending-output size above which a warning is logged
pub const DEFAULT_BUFFER_WARN_BYTES: usize = 64 * 1024;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for a single channel coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Maximum bytes requested by a single read call
    pub read_chunk_size: usize,
    /// Pending outbound bytes above which a high-water warning is logged
    pub buffer_warn_bytes: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            buffer_warn_bytes: DEFAULT_BUFFER_WARN_BYTES,
        }
    }
}

impl ChannelConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Small buffers so tests hit short reads and the warning path quickly
    pub fn testing() -> Self {
        Self {
            read_chunk_size: 16,
            buffer_warn_bytes: 64,
        }
    }

    /// Set the read scratch buffer size
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set the pending-output warning threshold
    pub fn with_buffer_warn_bytes(mut self, bytes: usize) -> Self {
        self.buffer_warn_bytes = bytes;
        self
    }

    /// Check that the configuration can drive a channel
    pub fn validate(&self) -> Result<()> {
        if self.read_chunk_size == 0 {
            return Err(ChannelError::InvalidConfiguration {
                reason: "read_chunk_size must be greater than zero".to_string(),
            });
        }
        if self.buffer_warn_bytes == 0 {
            return Err(ChannelError::InvalidConfiguration {
                reason: "buffer_warn_bytes must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_constants() {
        let config = ChannelConfig::default();
        assert_eq!(config.read_chunk_size, 1024);
        assert_eq!(config.buffer_warn_bytes, 65536);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let config = ChannelConfig::new().with_read_chunk_size(0);
        assert!(matches!(
            config.validate(),
            Err(ChannelError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_builder_overrides() {
        let config = ChannelConfig::new()
            .with_read_chunk_size(512)
            .with_buffer_warn_bytes(128);
        assert_eq!(config.read_chunk_size, 512);
        assert_eq!(config.buffer_warn_bytes, 128);
    }
}
