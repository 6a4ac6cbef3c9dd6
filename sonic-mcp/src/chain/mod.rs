//! Supported chains and RPC client management.
//!
//! - [`registry`] — the static chain table and [`NetworkIdentifier`] resolution.
//! - [`client`] — [`ClientCache`] with shared read clients and per-call signing clients.

mod client;
mod registry;

#[cfg(test)]
pub(crate) use self::client::testing;
pub use self::client::*;
pub use self::registry::*;
