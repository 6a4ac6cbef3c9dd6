//! Unified error types for the Sonic MCP server.
//!
//! Every variant carries a stable, machine-readable [`code`](Error::code) that
//! the capability layer places next to the human-readable message in error
//! responses.

use thiserror::Error;

/// Top-level error type for the server.
#[derive(Debug, Error)]
pub enum Error {
    /// Numeric chain identifier outside the supported set.
    #[error("Unsupported chain ID. Supported chains: {supported}. Requested: {requested}")]
    UnsupportedChain {
        /// The identifier as supplied by the caller.
        requested: String,
        /// Comma-separated list of supported chain IDs.
        supported: String,
    },

    /// Network name that is neither an alias nor a numeric chain ID.
    #[error("Unsupported network. Supported networks: {supported}. Requested: {requested}")]
    UnsupportedNetwork {
        /// The identifier as supplied by the caller.
        requested: String,
        /// Comma-separated list of supported aliases.
        supported: String,
    },

    /// Secret key material could not be parsed. Never carries the secret itself.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Address is not `0x` followed by 40 hex digits.
    #[error(
        "Invalid address format: {0}. Only 0x-prefixed 40-hex-digit addresses are supported; name-service names are not resolved"
    )]
    UnsupportedAddressFormat(String),

    /// A contract call failed in transport or returned an undecodable payload.
    #[error("{operation} on {network} for {input}: contract read failed: {detail}")]
    ContractRead {
        /// Service operation that issued the call.
        operation: &'static str,
        /// Network identifier the call was issued against.
        network: String,
        /// Contract address and function that failed.
        input: String,
        /// Underlying cause.
        detail: String,
    },

    /// An RPC call failed or returned an unexpected shape.
    #[error("{operation} on {network} for {input}: {detail}")]
    Transport {
        /// Service operation that issued the call.
        operation: &'static str,
        /// Network identifier the call was issued against.
        network: String,
        /// Address, hash or block the call was about.
        input: String,
        /// Underlying cause.
        detail: String,
    },

    /// Capability inputs failed schema validation or argument coercion.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No capability with the requested name or URI is registered.
    #[error("unknown {kind}: {name}")]
    UnknownCapability {
        /// `"tool"` or `"resource"`.
        kind: &'static str,
        /// Requested name or URI.
        name: String,
    },

    /// A capability name was registered twice within the same namespace.
    #[error("duplicate {kind} registration: {name}")]
    DuplicateCapability {
        /// `"tool"` or `"resource"`.
        kind: &'static str,
        /// Colliding name.
        name: String,
    },

    /// Configuration file could not be resolved, read, or parsed.
    #[error("config: {0}")]
    Config(String),

    /// Signer key resolution or derivation failed.
    #[error("signer: {0}")]
    Signer(String),

    /// Server bind or runtime error.
    #[error("server: {0}")]
    Server(String),
}

impl Error {
    /// Stable machine-readable tag for this error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedChain { .. } => "unsupported_chain",
            Self::UnsupportedNetwork { .. } => "unsupported_network",
            Self::InvalidCredential(_) => "invalid_credential",
            Self::UnsupportedAddressFormat(_) => "unsupported_address_format",
            Self::ContractRead { .. } => "contract_read_error",
            Self::Transport { .. } => "transport_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::UnknownCapability { .. } => "unknown_capability",
            Self::DuplicateCapability { .. } => "duplicate_capability",
            Self::Config(_) => "config_error",
            Self::Signer(_) => "signer_error",
            Self::Server(_) => "server_error",
        }
    }

    /// Configuration error with a plain message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Configuration error with an underlying cause appended.
    pub fn config_with(message: impl std::fmt::Display, cause: impl std::fmt::Display) -> Self {
        Self::Config(format!("{message}: {cause}"))
    }

    /// Server error with an underlying cause appended.
    pub fn server_with(message: impl std::fmt::Display, cause: impl std::fmt::Display) -> Self {
        Self::Server(format!("{message}: {cause}"))
    }

    /// Invalid capability input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Wraps an RPC failure with the operation, network and input it occurred in.
    pub fn transport(
        operation: &'static str,
        network: impl std::fmt::Display,
        input: impl std::fmt::Display,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self::Transport {
            operation,
            network: network.to_string(),
            input: input.to_string(),
            detail: cause.to_string(),
        }
    }

    /// Wraps a contract call failure with the operation, network and input it
    /// occurred in.
    pub fn contract_read(
        operation: &'static str,
        network: impl std::fmt::Display,
        input: impl std::fmt::Display,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self::ContractRead {
            operation,
            network: network.to_string(),
            input: input.to_string(),
            detail: cause.to_string(),
        }
    }
}
