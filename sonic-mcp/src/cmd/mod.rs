//! CLI definitions and command implementations.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::transport::Transport;

pub mod init;
pub mod serve;

/// Sonic MCP server: blockchain queries and transactions for AI assistants.
#[derive(Debug, Parser)]
#[command(name = "sonic-mcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a default TOML configuration file.
    Init {
        /// Output path for the configuration file.
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite the file if it already exists.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Start the MCP server.
    Serve {
        /// Path to the TOML configuration file. Defaults apply when omitted
        /// and `config.toml` does not exist.
        #[arg(short, long, env = "CONFIG")]
        config: Option<PathBuf>,

        /// Transport to serve on.
        #[arg(short, long, value_enum, env = "MCP_TRANSPORT", default_value_t = Transport::Stdio)]
        transport: Transport,
    },
}
