use alloy_network::TransactionBuilder;
use alloy_primitives::{B256, Bytes};
use alloy_provider::Provider;
use alloy_rpc_types_eth::{Transaction, TransactionReceipt, TransactionRequest};
use serde::Deserialize;

use super::Services;
use super::address::resolve_address;
use super::units::parse_amount;
use crate::chain::NetworkIdentifier;
use crate::error::Error;

/// Call parameters for [`Services::estimate_gas`].
#[derive(Debug, Clone, Deserialize)]
pub struct GasEstimate {
    /// Recipient address.
    pub to: String,
    /// Value in whole native units, e.g. `"0.1"`.
    #[serde(default)]
    pub value: Option<String>,
    /// Hex calldata.
    #[serde(default)]
    pub data: Option<String>,
}

impl GasEstimate {
    fn request(&self, native_decimals: u8) -> Result<TransactionRequest, Error> {
        let mut request = TransactionRequest::default().with_to(resolve_address(&self.to)?);
        if let Some(value) = self.value.as_deref().filter(|v| !v.is_empty()) {
            request = request.with_value(parse_amount(value, native_decimals)?);
        }
        if let Some(data) = self.data.as_deref().filter(|d| !d.is_empty()) {
            let bytes: Bytes = data
                .parse()
                .map_err(|e| Error::invalid_input(format!("invalid calldata: {e}")))?;
            request = request.with_input(bytes);
        }
        Ok(request)
    }
}

impl Services {
    /// Transaction by hash.
    ///
    /// # Errors
    ///
    /// Resolution or transport failures; an unknown hash is a transport error.
    pub async fn transaction(
        &self,
        hash: B256,
        network: Option<&NetworkIdentifier>,
    ) -> Result<Transaction, Error> {
        let network = self.network(network);
        self.reader(network)?
            .provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(|e| Error::transport("transaction", network, hash, e))?
            .ok_or_else(|| Error::transport("transaction", network, hash, "transaction not found"))
    }

    /// Receipt of a mined transaction.
    ///
    /// # Errors
    ///
    /// Resolution or transport failures; a pending or unknown transaction is a
    /// transport error.
    pub async fn transaction_receipt(
        &self,
        hash: B256,
        network: Option<&NetworkIdentifier>,
    ) -> Result<TransactionReceipt, Error> {
        let network = self.network(network);
        self.reader(network)?
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| Error::transport("transaction_receipt", network, hash, e))?
            .ok_or_else(|| Error::transport("transaction_receipt", network, hash, "receipt not found"))
    }

    /// Number of transactions sent from `address` (its next nonce).
    ///
    /// # Errors
    ///
    /// Address, resolution or transport failures.
    pub async fn transaction_count(
        &self,
        address: &str,
        network: Option<&NetworkIdentifier>,
    ) -> Result<u64, Error> {
        let address = resolve_address(address)?;
        let network = self.network(network);
        self.reader(network)?
            .provider
            .get_transaction_count(address)
            .await
            .map_err(|e| Error::transport("transaction_count", network, address, e))
    }

    /// Gas a call would consume.
    ///
    /// # Errors
    ///
    /// Input, resolution or transport failures.
    pub async fn estimate_gas(
        &self,
        params: &GasEstimate,
        network: Option<&NetworkIdentifier>,
    ) -> Result<u64, Error> {
        let network = self.network(network);
        let client = self.reader(network)?;
        let decimals = self
            .clients
            .chains()
            .describe(client.chain_id)
            .native_currency
            .decimals;
        let request = params.request(decimals)?;
        client
            .provider
            .estimate_gas(request)
            .await
            .map_err(|e| Error::transport("estimate_gas", network, &params.to, e))
    }

    /// Chain ID reported by the endpoint.
    ///
    /// # Errors
    ///
    /// Resolution or transport failures.
    pub async fn chain_id(&self, network: Option<&NetworkIdentifier>) -> Result<u64, Error> {
        let network = self.network(network);
        self.reader(network)?
            .provider
            .get_chain_id()
            .await
            .map_err(|e| Error::transport("chain_id", network, "eth_chainId", e))
    }
}
