//! Static chain table and network identifier resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::num::IntErrorKind;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Sonic mainnet chain ID.
pub const SONIC_MAINNET: u64 = 146;

/// Sonic Blaze testnet chain ID.
pub const SONIC_BLAZE_TESTNET: u64 = 14601;

/// Native currency metadata of a chain.
#[derive(Debug, Clone, Serialize)]
pub struct NativeCurrency {
    /// Currency name.
    pub name: &'static str,
    /// Ticker symbol.
    pub symbol: &'static str,
    /// Decimal precision of the smallest unit.
    pub decimals: u8,
}

/// Immutable description of a supported chain.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    /// Numeric EIP-155 chain ID.
    pub id: u64,
    /// Human-readable chain name.
    pub name: &'static str,
    /// Native currency of the chain.
    pub native_currency: NativeCurrency,
    /// Default HTTP RPC endpoint.
    pub rpc_url: &'static str,
    /// Block explorer base URL.
    pub explorer_url: &'static str,
    /// Whether this is a test network.
    pub testnet: bool,
}

const SONIC_CURRENCY: NativeCurrency = NativeCurrency {
    name: "Sonic",
    symbol: "S",
    decimals: 18,
};

const CHAINS: [ChainDescriptor; 2] = [
    ChainDescriptor {
        id: SONIC_MAINNET,
        name: "Sonic",
        native_currency: SONIC_CURRENCY,
        rpc_url: "https://rpc.soniclabs.com",
        explorer_url: "https://sonicscan.org",
        testnet: false,
    },
    ChainDescriptor {
        id: SONIC_BLAZE_TESTNET,
        name: "Sonic Blaze Testnet",
        native_currency: SONIC_CURRENCY,
        rpc_url: "https://rpc.testnet.soniclabs.com",
        explorer_url: "https://explorer.soniclabs.com",
        testnet: true,
    },
];

/// Network aliases in the order they are advertised.
const ALIASES: [(&str, u64); 2] = [("mainnet", SONIC_MAINNET), ("testnet", SONIC_BLAZE_TESTNET)];

/// A caller-supplied network selector: a numeric chain ID, an alias, or a
/// numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NetworkIdentifier {
    /// Numeric chain ID.
    Id(u64),
    /// Alias (`"mainnet"`, `"testnet"`, …) or numeric string.
    Name(String),
}

impl fmt::Display for NetworkIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<u64> for NetworkIdentifier {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for NetworkIdentifier {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for NetworkIdentifier {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Closed set of supported chains, built once at startup.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: BTreeMap<u64, ChainDescriptor>,
    aliases: Vec<(&'static str, u64)>,
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainRegistry {
    /// Builds the registry from the static chain table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chains: CHAINS.into_iter().map(|c| (c.id, c)).collect(),
            aliases: ALIASES.to_vec(),
        }
    }

    /// Resolves a network identifier to a supported numeric chain ID.
    ///
    /// Aliases are matched case-insensitively and take precedence over
    /// numeric-string parsing.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedChain`] for numeric identifiers outside the known set,
    /// [`Error::UnsupportedNetwork`] for strings that are neither an alias nor
    /// an integer.
    pub fn resolve(&self, identifier: &NetworkIdentifier) -> Result<u64, Error> {
        match identifier {
            NetworkIdentifier::Id(id) => self.check_id(*id, &id.to_string()),
            NetworkIdentifier::Name(name) => {
                let lowered = name.to_lowercase();
                if let Some((_, id)) = self.aliases.iter().find(|(alias, _)| *alias == lowered) {
                    return Ok(*id);
                }
                match lowered.parse::<i64>() {
                    Ok(parsed) => {
                        let id = u64::try_from(parsed)
                            .map_err(|_| self.unsupported_chain(&parsed.to_string()))?;
                        self.check_id(id, &parsed.to_string())
                    }
                    Err(e) if matches!(*e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                        Err(self.unsupported_chain(name))
                    }
                    Err(_) => Err(Error::UnsupportedNetwork {
                        requested: name.clone(),
                        supported: self.supported_networks().join(", "),
                    }),
                }
            }
        }
    }

    /// Returns the descriptor of an already-resolved chain ID.
    ///
    /// # Panics
    ///
    /// Panics if `chain_id` was not produced by [`ChainRegistry::resolve`].
    #[must_use]
    #[allow(clippy::panic)]
    pub fn describe(&self, chain_id: u64) -> &ChainDescriptor {
        self.chains
            .get(&chain_id)
            .unwrap_or_else(|| panic!("chain {chain_id} must be resolved before describe"))
    }

    /// Supported aliases, usable wherever a [`NetworkIdentifier`] is accepted.
    #[must_use]
    pub fn supported_networks(&self) -> Vec<&'static str> {
        self.aliases.iter().map(|(alias, _)| *alias).collect()
    }

    /// Supported numeric chain IDs in ascending order.
    #[must_use]
    pub fn supported_chain_ids(&self) -> Vec<u64> {
        self.chains.keys().copied().collect()
    }

    fn check_id(&self, id: u64, requested: &str) -> Result<u64, Error> {
        if self.chains.contains_key(&id) {
            Ok(id)
        } else {
            Err(self.unsupported_chain(requested))
        }
    }

    fn unsupported_chain(&self, requested: &str) -> Error {
        let supported = self
            .chains
            .keys()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Error::UnsupportedChain {
            requested: requested.to_owned(),
            supported,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ids_resolve_to_themselves() {
        let registry = ChainRegistry::new();
        for id in registry.supported_chain_ids() {
            assert_eq!(registry.resolve(&NetworkIdentifier::Id(id)).ok(), Some(id));
        }
    }

    #[test]
    fn unknown_ids_are_unsupported_chains() {
        let registry = ChainRegistry::new();
        for id in [0_u64, 1, 145, 147, 14600, 57054, u64::MAX] {
            let err = registry.resolve(&NetworkIdentifier::Id(id)).expect_err("must fail");
            assert!(matches!(err, Error::UnsupportedChain { .. }), "{id}: {err}");
            assert!(err.to_string().contains("146, 14601"));
        }
    }

    #[test]
    fn aliases_match_their_ids_in_any_case() {
        let registry = ChainRegistry::new();
        for (alias, id) in ALIASES {
            for spelling in [alias.to_owned(), alias.to_uppercase()] {
                assert_eq!(
                    registry.resolve(&spelling.into()).ok(),
                    registry.resolve(&NetworkIdentifier::Id(id)).ok()
                );
            }
        }
        assert_eq!(registry.resolve(&"TestNet".into()).ok(), Some(14601));
    }

    #[test]
    fn numeric_strings_follow_the_numeric_rules() {
        let registry = ChainRegistry::new();
        assert_eq!(registry.resolve(&"146".into()).ok(), Some(146));
        assert_eq!(registry.resolve(&"14601".into()).ok(), Some(14601));
        assert!(matches!(
            registry.resolve(&"1".into()),
            Err(Error::UnsupportedChain { .. })
        ));
        assert!(matches!(
            registry.resolve(&"-146".into()),
            Err(Error::UnsupportedChain { .. })
        ));
        let err = registry
            .resolve(&"99999999999999999999".into())
            .expect_err("must fail");
        assert!(matches!(err, Error::UnsupportedChain { .. }), "{err}");
        assert!(err.to_string().contains("99999999999999999999"));
    }

    #[test]
    fn unknown_names_list_aliases() {
        let registry = ChainRegistry::new();
        let err = registry.resolve(&"goerli".into()).expect_err("must fail");
        assert!(matches!(err, Error::UnsupportedNetwork { .. }));
        assert!(err.to_string().contains("mainnet, testnet"));
    }

    #[test]
    fn describe_returns_table_entry() {
        let registry = ChainRegistry::new();
        let testnet = registry.describe(SONIC_BLAZE_TESTNET);
        assert!(testnet.testnet);
        assert_eq!(testnet.native_currency.symbol, "S");
        assert_eq!(registry.describe(SONIC_MAINNET).rpc_url, "https://rpc.soniclabs.com");
    }

    #[test]
    fn identifiers_deserialize_from_numbers_and_strings() {
        let id: NetworkIdentifier = serde_json::from_str("146").expect("number");
        assert_eq!(id, NetworkIdentifier::Id(146));
        let name: NetworkIdentifier = serde_json::from_str("\"mainnet\"").expect("string");
        assert_eq!(name, NetworkIdentifier::Name("mainnet".into()));
    }
}
