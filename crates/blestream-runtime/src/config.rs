//! Runtime configuration

use blestream_core::ChannelConfig;
use serde::{Deserialize, Serialize};

use crate::error::{RuntimeError, RuntimeResult};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration shared by every connection task in a registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Settings applied to each channel coordinator
    pub channel: ChannelConfig,
    /// Maximum simultaneously registered peripherals
    pub max_connections: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            max_connections: 8, // iOS tolerates a handful of concurrent L2CAP peers
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for tests: small read chunks, few connections
    pub fn testing() -> Self {
        Self {
            channel: ChannelConfig::testing(),
            max_connections: 4,
        }
    }

    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        self.channel.validate()?;
        if self.max_connections == 0 {
            return Err(RuntimeError::InvalidConfiguration {
                reason: "max_connections must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_errors_propagate() {
        let config = RuntimeConfig::new()
            .with_channel(ChannelConfig::new().with_read_chunk_size(0));
        assert!(matches!(config.validate(), Err(RuntimeError::Channel(_))));
    }

    #[test]
    fn test_zero_connections_rejected() {
        let config = RuntimeConfig::new().with_max_connections(0);
        assert!(matches!(
            config.validate(),
            Err(RuntimeError::InvalidConfiguration { .. })
        ));
    }
}
