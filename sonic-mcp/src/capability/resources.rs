//! Resource registrations under the `sonic://` scheme.
//!
//! Templates without a `{network}` segment read from the default network.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{CapabilityDescriptor, RegistryBuilder, parse_input, to_output};
use crate::chain::NetworkIdentifier;
use crate::error::Error;
use crate::services::{Services, parse_hash};

fn resource<A, T, F, Fut>(
    services: &Services,
    name: &'static str,
    template: &'static str,
    description: &'static str,
    run: F,
) -> Result<CapabilityDescriptor, Error>
where
    A: DeserializeOwned,
    T: Serialize,
    F: Fn(Services, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, Error>> + Send + 'static,
{
    let services = services.clone();
    CapabilityDescriptor::resource(name, template, description, move |input: Value| {
        let pending = parse_input::<A>(input).map(|args| run(services.clone(), args));
        async move { to_output(&pending?.await?) }
    })
}

#[derive(Debug, Deserialize)]
struct NetworkParams {
    #[serde(default)]
    network: Option<NetworkIdentifier>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockParams {
    #[serde(default)]
    network: Option<NetworkIdentifier>,
    block_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockHashParams {
    #[serde(default)]
    network: Option<NetworkIdentifier>,
    block_hash: String,
}

#[derive(Debug, Deserialize)]
struct AddressParams {
    #[serde(default)]
    network: Option<NetworkIdentifier>,
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenParams {
    #[serde(default)]
    network: Option<NetworkIdentifier>,
    token_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenHolderParams {
    #[serde(default)]
    network: Option<NetworkIdentifier>,
    token_address: String,
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxParams {
    #[serde(default)]
    network: Option<NetworkIdentifier>,
    tx_hash: String,
}

fn parse_block_number(raw: &str) -> Result<u64, Error> {
    raw.parse()
        .map_err(|_| Error::invalid_input(format!("block number must be a non-negative integer, got '{raw}'")))
}

/// Registers every resource backed by `services`.
///
/// # Errors
///
/// [`Error::DuplicateCapability`] or a malformed template.
#[allow(clippy::too_many_lines)]
pub fn register_resources(builder: &mut RegistryBuilder, services: &Services) -> Result<(), Error> {
    let chain_info = |s: Services, p: NetworkParams| async move { s.chain_info(p.network.as_ref()).await };
    let latest_block = |s: Services, p: NetworkParams| async move { s.latest_block(p.network.as_ref()).await };
    let native_balance = |s: Services, p: AddressParams| async move {
        s.native_balance(&p.address, p.network.as_ref()).await
    };
    let token_balance = |s: Services, p: TokenHolderParams| async move {
        s.erc20_balance(&p.token_address, &p.address, p.network.as_ref())
            .await
    };
    let transaction = |s: Services, p: TxParams| async move {
        s.transaction(parse_hash(&p.tx_hash)?, p.network.as_ref()).await
    };

    let resources = [
        resource(
            services,
            "chain_info_by_network",
            "sonic://{network}/chain",
            "Chain ID, block height and RPC endpoint of a network",
            chain_info,
        )?,
        resource(
            services,
            "sonic_chain_info",
            "sonic://chain",
            "Chain information for the default network",
            chain_info,
        )?,
        resource(
            services,
            "sonic_block_by_number",
            "sonic://{network}/block/{blockNumber}",
            "Block at the given height",
            |s, p: BlockParams| async move {
                s.block_by_number(parse_block_number(&p.block_number)?, p.network.as_ref())
                    .await
            },
        )?,
        resource(
            services,
            "block_by_hash",
            "sonic://{network}/block/hash/{blockHash}",
            "Block with the given hash",
            |s, p: BlockHashParams| async move {
                s.block_by_hash(parse_hash(&p.block_hash)?, p.network.as_ref())
                    .await
            },
        )?,
        resource(
            services,
            "sonic_latest_block",
            "sonic://{network}/block/latest",
            "Latest block of a network",
            latest_block,
        )?,
        resource(
            services,
            "default_latest_block",
            "sonic://block/latest",
            "Latest block of the default network",
            latest_block,
        )?,
        resource(
            services,
            "sonic_address_native_balance",
            "sonic://{network}/address/{address}/balance",
            "Native S balance of an address",
            native_balance,
        )?,
        resource(
            services,
            "default_sonic_balance",
            "sonic://address/{address}/sonic-balance",
            "Native S balance of an address on the default network",
            native_balance,
        )?,
        resource(
            services,
            "erc20_balance",
            "sonic://{network}/address/{address}/token/{tokenAddress}/balance",
            "ERC-20 balance of an address",
            token_balance,
        )?,
        resource(
            services,
            "default_erc20_balance",
            "sonic://address/{address}/token/{tokenAddress}/balance",
            "ERC-20 balance of an address on the default network",
            token_balance,
        )?,
        resource(
            services,
            "sonic_transaction_details",
            "sonic://{network}/tx/{txHash}",
            "Transaction by hash",
            transaction,
        )?,
        resource(
            services,
            "default_transaction_by_hash",
            "sonic://tx/{txHash}",
            "Transaction by hash on the default network",
            transaction,
        )?,
        resource(
            services,
            "supported_networks",
            "sonic://networks",
            "Network names accepted in URIs and tool inputs",
            |s, _: Value| async move {
                Ok::<_, Error>(json!({
                    "supportedNetworks": s.supported_networks(),
                    "defaultNetwork": s.default_network().to_string(),
                }))
            },
        )?,
        resource(
            services,
            "erc20_token_details",
            "sonic://{network}/token/{tokenAddress}",
            "Name, symbol, decimals and supply of an ERC-20 token",
            |s, p: TokenParams| async move { s.token_info(&p.token_address, p.network.as_ref()).await },
        )?,
        resource(
            services,
            "erc20_token_address_balance",
            "sonic://{network}/token/{tokenAddress}/balanceOf/{address}",
            "ERC-20 balance of an address, token first",
            token_balance,
        )?,
    ];

    for descriptor in resources {
        builder.register(descriptor)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{U64, U256};

    use super::*;
    use crate::capability::{CapabilityKind, CapabilityRegistry};
    use crate::services::testing::mock_services;

    fn registry() -> (CapabilityRegistry, std::sync::Arc<crate::chain::testing::MockConnector>) {
        let (services, connector) = mock_services();
        let mut builder = RegistryBuilder::new();
        register_resources(&mut builder, &services).expect("register");
        (builder.build(), connector)
    }

    #[test]
    fn registers_every_resource_with_its_template() {
        let (registry, _) = registry();
        let listed = registry.list(CapabilityKind::Resource);
        assert_eq!(listed.len(), 15);
        let networks = listed
            .iter()
            .find(|s| s.name == "supported_networks")
            .expect("networks");
        assert_eq!(networks.uri_template.as_deref(), Some("sonic://networks"));
    }

    #[tokio::test]
    async fn network_balance_uri_reads_that_network() {
        let (registry, connector) = registry();
        connector
            .asserter
            .push_success(&U256::from(3_000_000_000_000_000_000_u128));
        let data = registry
            .read_resource("sonic://mainnet/address/0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266/balance")
            .await
            .expect("balance");
        assert_eq!(data["formatted"], "3");
    }

    #[tokio::test]
    async fn uris_without_network_use_the_default() {
        let (registry, connector) = registry();
        connector.asserter.push_success(&U64::from(14601));
        connector.asserter.push_success(&U64::from(99));
        let data = registry.read_resource("sonic://chain").await.expect("chain");
        assert_eq!(data["network"], "testnet");
        assert_eq!(data["chainId"], 14601);
        assert_eq!(data["blockNumber"], 99);
    }

    #[tokio::test]
    async fn malformed_parameters_are_invalid_input() {
        let (registry, connector) = registry();
        let err = registry
            .read_resource("sonic://testnet/block/twelve")
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = registry
            .read_resource("sonic://unknown/chain")
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::UnsupportedNetwork { .. }));
        assert_eq!(connector.reads(), 0);
    }
}
