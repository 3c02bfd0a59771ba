//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Bytes the simulated link accepts per write
    #[arg(long)]
    pub write_window: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send messages over a simulated channel and print what echoes back
    Echo {
        /// Messages to send, in order
        #[arg(required = true)]
        messages: Vec<String>,
    },
    /// Print the effective configuration as TOML
    Config,
}
