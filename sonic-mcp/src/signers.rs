//! Secret key parsing and default signer resolution.
//!
//! Signing tools accept a per-call private key. When a call omits it, the
//! server falls back to the default signer configured in the `[signer]`
//! section of the TOML config:
//!
//! 1. `private_key` — a hex key, literal or an environment reference — highest.
//! 2. `mnemonic` — a BIP-39 phrase derived along a BIP-44 path via the
//!    [`kobe`] crate family — lowest.
//!
//! Key material is never logged, and [`SecretKey`] redacts itself in `Debug`.

use std::fmt;

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Default EVM BIP-44 derivation path (`MetaMask` / Trezor compatible).
const DEFAULT_EVM_PATH: &str = "m/44'/60'/0'/0/0";

/// Resolve an environment-variable reference (`$VAR` or `${VAR}`), returning
/// the literal string unchanged if it does not match either pattern.
///
/// # Errors
///
/// Returns [`Error::Config`] if the referenced variable is not set.
pub fn resolve_env(value: &str) -> Result<String, Error> {
    if let Some(var_name) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        return lookup_env(var_name, value);
    }
    if let Some(var_name) = value.strip_prefix('$')
        && !var_name.is_empty()
        && var_name.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return lookup_env(var_name, value);
    }
    Ok(value.to_owned())
}

fn lookup_env(var_name: &str, reference: &str) -> Result<String, Error> {
    std::env::var(var_name).map_err(|_| {
        Error::config(format!(
            "env var '{var_name}' not found (referenced as '{reference}')"
        ))
    })
}

/// A hex-encoded private key held only for the duration of a call.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    /// Wraps raw key material, with or without a `0x` prefix.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Parses the key into a local signer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredential`] if the key is not 32 bytes of hex.
    /// The message never includes the key.
    pub fn signer(&self) -> Result<PrivateKeySigner, Error> {
        let trimmed = self.0.trim();
        let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidCredential(
                "private key must be 32 bytes of hex (64 digits, optional 0x prefix)".into(),
            ));
        }
        hex_part
            .parse::<PrivateKeySigner>()
            .map_err(|_| Error::InvalidCredential("private key is not a valid secp256k1 scalar".into()))
    }

    /// Derives the account address controlled by this key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredential`] on malformed key material.
    pub fn address(&self) -> Result<Address, Error> {
        Ok(self.signer()?.address())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// `[signer]` section of the TOML config.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Hex private key or `$VAR` reference.
    #[serde(default)]
    pub private_key: Option<String>,
    /// BIP-39 mnemonic or `$VAR` reference.
    #[serde(default)]
    pub mnemonic: Option<String>,
    /// Optional BIP-39 passphrase.
    #[serde(default)]
    pub passphrase: Option<String>,
    /// BIP-44 derivation path (default `m/44'/60'/0'/0/0`).
    #[serde(default)]
    pub derivation_path: Option<String>,
}

impl fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .field("derivation_path", &self.derivation_path)
            .finish_non_exhaustive()
    }
}

impl SignerConfig {
    /// Resolves the configured default signer, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment reference is unset, the mnemonic
    /// cannot be parsed, or derivation fails.
    pub fn resolve(&self) -> Result<Option<SecretKey>, Error> {
        if let Some(raw) = &self.private_key {
            let key = resolve_env(raw)?;
            if !key.trim().is_empty() {
                let key = SecretKey::new(key);
                key.signer()
                    .map_err(|e| Error::Signer(format!("configured private_key: {e}")))?;
                return Ok(Some(key));
            }
        }
        if let Some(raw) = &self.mnemonic {
            let mnemonic = resolve_env(raw)?;
            let passphrase = self.passphrase.as_deref().map(resolve_env).transpose()?;
            let key = derive_evm_key(
                &mnemonic,
                passphrase.as_deref(),
                self.derivation_path.as_deref(),
            )?;
            return Ok(Some(key));
        }
        Ok(None)
    }
}

/// Derive an EVM private key from a mnemonic phrase.
fn derive_evm_key(
    mnemonic: &str,
    passphrase: Option<&str>,
    path: Option<&str>,
) -> Result<SecretKey, Error> {
    let wallet = kobe::Wallet::from_mnemonic(mnemonic, passphrase)
        .map_err(|e| Error::Signer(format!("mnemonic parse error: {e}")))?;
    let deriver = kobe_eth::Deriver::new(&wallet);
    let derived = deriver
        .derive_path(path.unwrap_or(DEFAULT_EVM_PATH))
        .map_err(|e| Error::Signer(format!("EVM key derivation error: {e}")))?;
    Ok(SecretKey::new(format!("0x{}", &*derived.private_key_hex)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANVIL_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const ANVIL_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn derives_address_with_or_without_prefix() {
        let expected: Address = ANVIL_ADDRESS.parse().expect("address");
        assert_eq!(SecretKey::new(ANVIL_KEY).address().ok(), Some(expected));
        assert_eq!(
            SecretKey::new(format!("0x{ANVIL_KEY}")).address().ok(),
            Some(expected)
        );
    }

    #[test]
    fn rejects_malformed_keys_without_echoing_them() {
        let too_long = format!("{ANVIL_KEY}00");
        for raw in ["", "0x", "not-a-key", "0x1234", too_long.as_str()] {
            let err = SecretKey::new(raw).signer().err().expect("must fail");
            assert!(matches!(err, Error::InvalidCredential(_)));
            if raw.len() > 8 {
                assert!(!err.to_string().contains(raw));
            }
        }
        let zero = SecretKey::new("0".repeat(64)).signer().err().expect("zero scalar");
        assert!(matches!(zero, Error::InvalidCredential(_)));
    }

    #[test]
    fn debug_is_redacted() {
        let key = SecretKey::new(ANVIL_KEY);
        assert!(!format!("{key:?}").contains(ANVIL_KEY));
    }

    #[test]
    fn literal_values_pass_through_env_resolution() {
        assert_eq!(
            resolve_env("https://rpc.soniclabs.com").ok().as_deref(),
            Some("https://rpc.soniclabs.com")
        );
        assert_eq!(resolve_env("$").ok().as_deref(), Some("$"));
        assert!(resolve_env("${SONIC_MCP_SURELY_UNSET_VAR}").is_err());
    }

    #[test]
    fn empty_signer_config_resolves_to_none() {
        assert!(matches!(SignerConfig::default().resolve(), Ok(None)));
    }
}
