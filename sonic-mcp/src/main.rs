//! Sonic MCP Server
//!
//! A Model Context Protocol server exposing read queries and signed
//! transactions on the Sonic EVM networks (mainnet 146, Blaze testnet 14601)
//! as named tools and `sonic://` resources.
//!
//! ```sh
//! sonic-mcp init                      # Generate default config.toml
//! sonic-mcp serve                     # Serve over stdio
//! sonic-mcp serve --transport http    # Serve JSON-RPC over HTTP
//! ```

mod capability;
mod chain;
mod cmd;
mod config;
mod error;
mod protocol;
mod services;
mod signal;
mod signers;
mod telemetry;
mod transport;

use clap::Parser;
use cmd::{Cli, Commands};

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { output, force } => cmd::init::run(&output, force),
        Commands::Serve { config, transport } => cmd::serve::run(config.as_deref(), transport).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
