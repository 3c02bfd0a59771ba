//! Command handlers for the blestream CLI

use std::time::Duration;

use blestream_runtime::{ChannelEvent, ConnectionRegistry, SimulatedPeer};
use tokio::time::{timeout, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cli::Commands;
use crate::config::CliConfig;
use crate::error::{CliError, Result};

/// How long to wait for the echo to come back
const ECHO_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between peer echo passes while waiting for events
const ECHO_POLL: Duration = Duration::from_millis(10);

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(command: Commands, config: CliConfig) -> Result<()> {
        match command {
            Commands::Echo { messages } => Self::handle_echo_command(&config, &messages).await,
            Commands::Config => Self::handle_config_command(&config),
        }
    }

    /// Handle the echo command
    async fn handle_echo_command(config: &CliConfig, messages: &[String]) -> Result<()> {
        let chunks = run_echo(config, messages).await?;
        for chunk in &chunks {
            println!(
                "received {} bytes: {}",
                chunk.len(),
                String::from_utf8_lossy(chunk)
            );
        }
        Ok(())
    }

    /// Handle the config command
    fn handle_config_command(config: &CliConfig) -> Result<()> {
        print!("{}", config.to_toml()?);
        Ok(())
    }
}

/// Send `messages` over a simulated channel whose peer echoes everything back
///
/// Returns the received chunks in arrival order.
pub async fn run_echo(config: &CliConfig, messages: &[String]) -> Result<Vec<Vec<u8>>> {
    let registry = ConnectionRegistry::new(config.runtime.clone())?;
    run_echo_in(&registry, config, messages).await
}

/// Echo through `registry`, shutting it down however the echo ends
pub(crate) async fn run_echo_in(
    registry: &ConnectionRegistry,
    config: &CliConfig,
    messages: &[String],
) -> Result<Vec<Vec<u8>>> {
    let result = echo_over(registry, config, messages).await;
    registry.shutdown().await;
    result
}

async fn echo_over(
    registry: &ConnectionRegistry,
    config: &CliConfig,
    messages: &[String],
) -> Result<Vec<Vec<u8>>> {
    let peripheral = Uuid::new_v4();
    let parts = registry.connect(peripheral)?;
    let mut events = parts.events;
    let handle = parts.handle;

    let peer = SimulatedPeer::connect(parts.transport, &config.link)?;
    timeout(ECHO_TIMEOUT, handle.wait_for_state(|s| s.is_open()))
        .await
        .map_err(|_| CliError::Echo("channel did not open".to_string()))??;
    info!(peripheral = %peripheral, handle = %peer.handle_id(), "simulated channel open");

    for message in messages {
        handle.send(message.as_bytes())?;
    }

    let expected: usize = messages.iter().map(String::len).sum();
    let deadline = Instant::now() + ECHO_TIMEOUT;
    let mut chunks = Vec::new();
    let mut received = 0;

    while received < expected {
        if Instant::now() >= deadline {
            return Err(CliError::Echo(format!(
                "received {received} of {expected} bytes before timing out"
            )));
        }

        peer.echo()?;
        match timeout(ECHO_POLL, events.recv()).await {
            Ok(Some(ChannelEvent::DataReceived(chunk))) => {
                received += chunk.len();
                chunks.push(chunk);
            }
            Ok(Some(ChannelEvent::TransportError(err))) => return Err(err.into()),
            Ok(Some(ChannelEvent::StateChanged(state))) => debug!(%state, "channel state"),
            Ok(None) => return Err(CliError::Echo("event stream closed".to_string())),
            Err(_) => {}
        }
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blestream_runtime::{LinkConfig, RuntimeConfig};

    fn config(window: usize) -> CliConfig {
        CliConfig {
            runtime: RuntimeConfig::testing(),
            link: LinkConfig::default().with_write_window(window),
        }
    }

    #[tokio::test]
    async fn test_echo_returns_messages_in_order() {
        let messages = vec!["HELLO".to_string(), " ".to_string(), "WORLD".to_string()];

        let chunks = run_echo(&config(3), &messages).await.unwrap();

        assert_eq!(chunks.concat(), b"HELLO WORLD");
    }

    #[tokio::test]
    async fn test_failed_echo_still_shuts_down_registry() {
        let registry = ConnectionRegistry::new(RuntimeConfig::testing()).unwrap();
        let broken = CliConfig {
            runtime: RuntimeConfig::testing(),
            link: LinkConfig::default().with_capacity(0),
        };

        let result = run_echo_in(&registry, &broken, &["HELLO".to_string()]).await;

        assert!(matches!(result, Err(CliError::Runtime(_))));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_long_message_arrives_in_read_chunks() {
        let message = "x".repeat(100);

        let chunks = run_echo(&config(251), &[message.clone()]).await.unwrap();

        let chunk_size = RuntimeConfig::testing().channel.read_chunk_size;
        assert!(chunks.iter().all(|c| c.len() <= chunk_size));
        assert_eq!(chunks.concat(), message.as_bytes());
    }
}
