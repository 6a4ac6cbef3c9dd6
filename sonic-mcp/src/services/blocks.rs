use alloy_primitives::B256;
use alloy_provider::Provider;
use alloy_rpc_types_eth::{Block, BlockNumberOrTag};

use super::Services;
use crate::chain::NetworkIdentifier;
use crate::error::Error;

impl Services {
    /// Current block height.
    ///
    /// # Errors
    ///
    /// Resolution or transport failures.
    pub async fn block_number(&self, network: Option<&NetworkIdentifier>) -> Result<u64, Error> {
        let network = self.network(network);
        self.reader(network)?
            .provider
            .get_block_number()
            .await
            .map_err(|e| Error::transport("block_number", network, BlockNumberOrTag::Latest, e))
    }

    /// Block at height `number`, transactions as hashes.
    ///
    /// # Errors
    ///
    /// Resolution or transport failures; a missing block is a transport error.
    pub async fn block_by_number(
        &self,
        number: u64,
        network: Option<&NetworkIdentifier>,
    ) -> Result<Block, Error> {
        self.block_at("block_by_number", BlockNumberOrTag::Number(number), network)
            .await
    }

    /// Most recent block.
    ///
    /// # Errors
    ///
    /// Resolution or transport failures.
    pub async fn latest_block(&self, network: Option<&NetworkIdentifier>) -> Result<Block, Error> {
        self.block_at("latest_block", BlockNumberOrTag::Latest, network)
            .await
    }

    /// Block with hash `hash`.
    ///
    /// # Errors
    ///
    /// Resolution or transport failures; a missing block is a transport error.
    pub async fn block_by_hash(
        &self,
        hash: B256,
        network: Option<&NetworkIdentifier>,
    ) -> Result<Block, Error> {
        let network = self.network(network);
        self.reader(network)?
            .provider
            .get_block_by_hash(hash)
            .await
            .map_err(|e| Error::transport("block_by_hash", network, hash, e))?
            .ok_or_else(|| Error::transport("block_by_hash", network, hash, "block not found"))
    }

    async fn block_at(
        &self,
        operation: &'static str,
        tag: BlockNumberOrTag,
        network: Option<&NetworkIdentifier>,
    ) -> Result<Block, Error> {
        let network = self.network(network);
        self.reader(network)?
            .provider
            .get_block_by_number(tag)
            .await
            .map_err(|e| Error::transport(operation, network, tag, e))?
            .ok_or_else(|| Error::transport(operation, network, tag, "block not found"))
    }
}
