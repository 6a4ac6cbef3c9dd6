//! Configuration loading and default template generation.
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 3002
//! default_network = "testnet"
//! rpc_url = "$SONIC_RPC_URL"
//!
//! [signer]
//! private_key = "$WALLET_PRIVATE_KEY"
//! ```
//!
//! Values absent from the file fall back to environment variables (`HOST`,
//! `PORT`, `SONIC_RPC_URL`, `WALLET_PRIVATE_KEY`) and then to built-in defaults.

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chain::NetworkIdentifier;
use crate::error::Error;
use crate::signers::{SecretKey, SignerConfig, resolve_env};

/// Config file read when `serve` is started without `--config`.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

const DEFAULT_PORT: u16 = 3002;

fn default_host() -> IpAddr {
    env::var("HOST")
        .ok()
        .and_then(|h| h.parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn default_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

fn default_network() -> NetworkIdentifier {
    NetworkIdentifier::Name("testnet".into())
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    host: IpAddr,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_network")]
    default_network: NetworkIdentifier,
    #[serde(default)]
    rpc_url: Option<String>,
    #[serde(default)]
    signer: SignerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            default_network: default_network(),
            rpc_url: None,
            signer: SignerConfig::default(),
        }
    }
}

impl Config {
    /// HTTP bind address.
    pub const fn host(&self) -> IpAddr {
        self.host
    }

    /// HTTP bind port.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Network used when a call omits one.
    pub const fn default_network(&self) -> &NetworkIdentifier {
        &self.default_network
    }

    /// RPC endpoint overriding every chain's public endpoint, if configured.
    ///
    /// # Errors
    ///
    /// Fails on an unset `$VAR` reference or a malformed URL.
    pub fn rpc_url(&self) -> Result<Option<Url>, Error> {
        let raw = match &self.rpc_url {
            Some(raw) => resolve_env(raw)?,
            None => env::var("SONIC_RPC_URL").unwrap_or_default(),
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        Url::parse(raw)
            .map(Some)
            .map_err(|e| Error::config_with(format!("invalid rpc_url '{raw}'"), e))
    }

    /// Default signing key, from `[signer]` or `WALLET_PRIVATE_KEY`.
    ///
    /// # Errors
    ///
    /// Fails if the configured key or mnemonic cannot be resolved.
    pub fn default_signer(&self) -> Result<Option<SecretKey>, Error> {
        if self.signer.private_key.is_some() || self.signer.mnemonic.is_some() {
            return self.signer.resolve();
        }
        let fallback = SignerConfig {
            private_key: env::var("WALLET_PRIVATE_KEY").ok(),
            ..SignerConfig::default()
        };
        fallback.resolve()
    }
}

/// Loads configuration from `path`, or from [`DEFAULT_CONFIG_PATH`] when
/// `path` is `None`.
///
/// A missing file at the default path yields the defaults; an explicitly
/// named file must exist.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<Config, Error> {
    let (path, explicit) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_PATH), false),
    };
    if !explicit && !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config_with(format!("failed to read config file '{}'", path.display()), e))?;
    parse_config(&content)
        .map_err(|e| Error::config_with(format!("failed to parse TOML config '{}'", path.display()), e))
}

fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

/// Generate a default TOML configuration template.
#[must_use]
pub fn generate_default_config() -> String {
    format!(
        r#"# Sonic MCP Server Configuration

# HTTP transport bind address and port.
# Can also be set via HOST / PORT environment variables.
host = "0.0.0.0"
port = {DEFAULT_PORT}

# Network used when a tool call or resource URI omits one.
# Accepts an alias ("mainnet", "testnet") or a chain ID.
default_network = "testnet"

# Optional RPC endpoint used for every chain instead of the public ones.
# Values support environment variable references: "$VAR" or "${{VAR}}".
# rpc_url = "$SONIC_RPC_URL"

# ── Default signer ──────────────────────────────────────────────────
# Used by signing tools when a call omits `privateKey`.
# When neither key is set, WALLET_PRIVATE_KEY is consulted.

[signer]
# private_key = "$WALLET_PRIVATE_KEY"
# mnemonic = "$WALLET_MNEMONIC"
# passphrase = ""
# derivation_path = "m/44'/60'/0'/0/0"
"#
    )
}
