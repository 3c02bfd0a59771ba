//! Error handling for the blestream CLI

use blestream_core::ChannelError;
use blestream_runtime::RuntimeError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Echo failed: {0}")]
    Echo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        CliError::Config(err.to_string())
    }
}
