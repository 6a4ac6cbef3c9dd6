//! Query and mutation operations over the supported chains.
//!
//! [`Services`] is the single entry point used by the capability layer. Every
//! operation takes an optional [`NetworkIdentifier`] that falls back to the
//! process default network, resolves it through the shared [`ClientCache`],
//! and issues exactly one forwarded RPC call (or one concurrent batch for the
//! token metadata reads). Nothing is retried; transport failures are wrapped
//! with the operation name and network.

mod abi;
mod address;
mod balance;
mod blocks;
mod contracts;
mod tokens;
mod transactions;
mod transfer;
mod units;

use std::sync::Arc;

use serde::Serialize;

pub use self::abi::ContractCall;
pub use self::address::{parse_hash, resolve_address};
pub use self::balance::{NativeBalance, TokenBalance, TokenMeta};
pub use self::tokens::TokenInfo;
pub use self::transactions::GasEstimate;
pub use self::transfer::{TokenTransfer, TransferAmount};
use crate::chain::{ClientCache, NetworkIdentifier, ReadClient};
use crate::error::Error;
use crate::signers::SecretKey;

/// Chain summary returned by [`Services::chain_info`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    /// Network identifier as requested.
    pub network: String,
    /// Chain ID reported by the endpoint.
    pub chain_id: u64,
    /// Current block height.
    pub block_number: u64,
    /// Endpoint the read client is bound to.
    pub rpc_url: String,
}

/// Stateless service facade over the client cache.
#[derive(Debug, Clone)]
pub struct Services {
    clients: Arc<ClientCache>,
    default_network: NetworkIdentifier,
    default_signer: Option<SecretKey>,
}

impl Services {
    /// Creates the service layer over `clients`.
    pub const fn new(clients: Arc<ClientCache>, default_network: NetworkIdentifier) -> Self {
        Self {
            clients,
            default_network,
            default_signer: None,
        }
    }

    /// Sets the signer used when a signing call supplies no key.
    #[must_use]
    pub fn with_default_signer(mut self, signer: Option<SecretKey>) -> Self {
        self.default_signer = signer;
        self
    }

    /// The shared client cache.
    pub const fn clients(&self) -> &Arc<ClientCache> {
        &self.clients
    }

    /// The network used when a call does not name one.
    pub const fn default_network(&self) -> &NetworkIdentifier {
        &self.default_network
    }

    /// Resolves `network`, falling back to the default network.
    pub fn network<'a>(&'a self, network: Option<&'a NetworkIdentifier>) -> &'a NetworkIdentifier {
        network.unwrap_or(&self.default_network)
    }

    /// Picks the caller's key, or the configured default signer.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCredential`] when neither is available.
    pub fn secret(&self, provided: Option<&str>) -> Result<SecretKey, Error> {
        match provided.filter(|key| !key.trim().is_empty()) {
            Some(key) => Ok(SecretKey::new(key)),
            None => self.default_signer.clone().ok_or_else(|| {
                Error::InvalidCredential(
                    "private key not provided and no default signer configured".into(),
                )
            }),
        }
    }

    /// Aliases accepted wherever a network identifier is.
    pub fn supported_networks(&self) -> Vec<&'static str> {
        self.clients.chains().supported_networks()
    }

    /// Chain ID, block height and endpoint of a network.
    ///
    /// # Errors
    ///
    /// Resolution or transport failures.
    pub async fn chain_info(
        &self,
        network: Option<&NetworkIdentifier>,
    ) -> Result<ChainInfo, Error> {
        let network = self.network(network);
        let chain_id = self.chain_id(Some(network)).await?;
        let block_number = self.block_number(Some(network)).await?;
        Ok(ChainInfo {
            network: network.to_string(),
            chain_id,
            block_number,
            rpc_url: self.clients.endpoint(network)?.to_string(),
        })
    }

    fn reader(&self, network: &NetworkIdentifier) -> Result<Arc<ReadClient>, Error> {
        self.clients.read_client(network)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use super::Services;
    use crate::chain::NetworkIdentifier;
    use crate::chain::testing::{MockConnector, mock_cache};

    pub(crate) fn mock_services() -> (Services, Arc<MockConnector>) {
        let (cache, connector) = mock_cache();
        (
            Services::new(cache, NetworkIdentifier::Name("testnet".into())),
            connector,
        )
    }
}
