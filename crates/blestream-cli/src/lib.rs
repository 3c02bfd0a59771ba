//! blestream CLI library
//!
//! Argument parsing, layered configuration and the command handlers behind
//! the `blestream` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{Cli, Commands};
pub use commands::{run_echo, CommandDispatcher};
pub use config::{CliConfig, CliOverrides};
pub use error::{CliError, Result};
