//! Transports carrying MCP messages to and from [`McpServer`](crate::protocol::McpServer).

pub mod http;
pub mod stdio;

use clap::ValueEnum;

/// Transport selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout.
    Stdio,
    /// JSON-RPC over HTTP POST.
    Http,
}
