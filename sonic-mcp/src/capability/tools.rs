//! Tool registrations.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{CapabilityDescriptor, Field, FieldType, InputSchema, RegistryBuilder, parse_input, to_output};
use crate::chain::{NetworkIdentifier, derive_address};
use crate::error::Error;
use crate::services::{ContractCall, GasEstimate, Services, parse_hash};

const NETWORK_HELP: &str =
    "Network name ('mainnet', 'testnet') or chain ID (146, 14601). Defaults to the configured network.";
const KEY_HELP: &str = "Private key in hex (with or without 0x). Used only to sign this call and never stored. Falls back to the configured default signer.";

/// Wraps a typed service call as a tool handler.
fn tool<A, T, F, Fut>(
    services: &Services,
    name: &'static str,
    description: &'static str,
    schema: InputSchema,
    run: F,
) -> CapabilityDescriptor
where
    A: DeserializeOwned,
    T: Serialize,
    F: Fn(Services, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, Error>> + Send + 'static,
{
    let services = services.clone();
    CapabilityDescriptor::tool(name, description, schema, move |input: Value| {
        let pending = parse_input::<A>(input).map(|args| run(services.clone(), args));
        async move { to_output(&pending?.await?) }
    })
}

fn network() -> Field {
    Field::new("network", FieldType::StringOrInteger, NETWORK_HELP)
}

fn private_key() -> Field {
    Field::string("privateKey", KEY_HELP)
}

fn hash(name: &'static str, description: &'static str) -> Field {
    Field::string(name, description).with_validator(|value| {
        value
            .as_str()
            .map(parse_hash)
            .transpose()
            .map(|_| ())
            .map_err(|e| e.to_string())
    })
}

fn amount(description: &'static str) -> Field {
    Field::string("amount", description).with_validator(|value| match value.as_str() {
        Some(text) if !text.trim().is_empty() => Ok(()),
        _ => Err("amount must not be empty".into()),
    })
}

#[derive(Debug, Deserialize)]
struct NetworkArgs {
    #[serde(default)]
    network: Option<NetworkIdentifier>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockNumberArgs {
    block_number: u64,
    #[serde(default)]
    network: Option<NetworkIdentifier>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockHashArgs {
    block_hash: String,
    #[serde(default)]
    network: Option<NetworkIdentifier>,
}

#[derive(Debug, Deserialize)]
struct AddressArgs {
    address: String,
    #[serde(default)]
    network: Option<NetworkIdentifier>,
}

/// ERC-20 balance lookup; the holder field name differs between aliases.
fn token_balance(
    services: &Services,
    name: &'static str,
    description: &'static str,
    holder_field: &'static str,
) -> CapabilityDescriptor {
    tool(
        services,
        name,
        description,
        InputSchema::new(
            vec![
                Field::string("tokenAddress", "ERC-20 token contract"),
                Field::string(holder_field, "Address to check"),
            ],
            vec![network()],
        ),
        |s, a: TokenHolderArgs| async move {
            s.erc20_balance(&a.token_address, &a.owner_address, a.network.as_ref())
                .await
        },
    )
}

fn token_transfer(services: &Services, name: &'static str, description: &'static str) -> CapabilityDescriptor {
    tool(
        services,
        name,
        description,
        InputSchema::new(
            vec![
                Field::string("tokenAddress", "ERC-20 token contract"),
                Field::string("toAddress", "Recipient address"),
                amount("Amount in token units, e.g. '10'"),
            ],
            vec![private_key(), network()],
        ),
        |s, a: TokenTransferArgs| async move {
            let secret = s.secret(a.private_key.as_deref())?;
            s.transfer_erc20(&secret, &a.token_address, &a.to_address, &a.amount, a.network.as_ref())
                .await
        },
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenArgs {
    token_address: String,
    #[serde(default)]
    network: Option<NetworkIdentifier>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenHolderArgs {
    token_address: String,
    #[serde(alias = "holderAddress")]
    owner_address: String,
    #[serde(default)]
    network: Option<NetworkIdentifier>,
}

#[derive(Debug, Deserialize)]
struct HashArgs {
    hash: String,
    #[serde(default)]
    network: Option<NetworkIdentifier>,
}

#[derive(Debug, Deserialize)]
struct GasArgs {
    #[serde(flatten)]
    params: GasEstimate,
    #[serde(default)]
    network: Option<NetworkIdentifier>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativeTransferArgs {
    #[serde(default)]
    private_key: Option<String>,
    to: String,
    amount: String,
    #[serde(default)]
    network: Option<NetworkIdentifier>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenTransferArgs {
    #[serde(default)]
    private_key: Option<String>,
    token_address: String,
    #[serde(alias = "spenderAddress")]
    to_address: String,
    amount: String,
    #[serde(default)]
    network: Option<NetworkIdentifier>,
}

#[derive(Debug, Deserialize)]
struct ReadContractArgs {
    #[serde(flatten)]
    call: ContractCall,
    #[serde(default)]
    network: Option<NetworkIdentifier>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteContractArgs {
    #[serde(flatten)]
    call: ContractCall,
    #[serde(default)]
    private_key: Option<String>,
    #[serde(default)]
    network: Option<NetworkIdentifier>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyArgs {
    #[serde(default)]
    private_key: Option<String>,
}

/// Registers every tool backed by `services`.
///
/// # Errors
///
/// [`Error::DuplicateCapability`] if a tool name is already taken.
#[allow(clippy::too_many_lines)]
pub fn register_tools(builder: &mut RegistryBuilder, services: &Services) -> Result<(), Error> {
    let tools = [
        tool(
            services,
            "get_chain_info",
            "Get chain ID, current block number and RPC endpoint of a Sonic network",
            InputSchema::new(vec![], vec![network()]),
            |s, a: NetworkArgs| async move { s.chain_info(a.network.as_ref()).await },
        ),
        tool(
            services,
            "get_supported_networks",
            "List the network names accepted by every tool",
            InputSchema::empty(),
            |s, _: Value| async move {
                Ok::<_, Error>(json!({
                    "supportedNetworks": s.supported_networks(),
                    "defaultNetwork": s.default_network().to_string(),
                }))
            },
        ),
        tool(
            services,
            "get_block_by_number",
            "Get a block by its number",
            InputSchema::new(
                vec![Field::new(
                    "blockNumber",
                    FieldType::Integer {
                        min: Some(0),
                        max: None,
                    },
                    "Block number to fetch",
                )],
                vec![network()],
            ),
            |s, a: BlockNumberArgs| async move {
                s.block_by_number(a.block_number, a.network.as_ref()).await
            },
        ),
        tool(
            services,
            "get_block_by_hash",
            "Get a block by its hash",
            InputSchema::new(vec![hash("blockHash", "Block hash (0x + 64 hex digits)")], vec![network()]),
            |s, a: BlockHashArgs| async move {
                s.block_by_hash(parse_hash(&a.block_hash)?, a.network.as_ref()).await
            },
        ),
        tool(
            services,
            "get_latest_block",
            "Get the latest block",
            InputSchema::new(vec![], vec![network()]),
            |s, a: NetworkArgs| async move { s.latest_block(a.network.as_ref()).await },
        ),
        tool(
            services,
            "get_balance",
            "Get the native token balance (S) of an address",
            InputSchema::new(vec![Field::string("address", "Account address (0x + 40 hex digits)")], vec![network()]),
            |s, a: AddressArgs| async move { s.native_balance(&a.address, a.network.as_ref()).await },
        ),
        token_balance(
            services,
            "get_erc20_balance",
            "Get the ERC-20 token balance of an address",
            "holderAddress",
        ),
        token_balance(
            services,
            "get_token_balance",
            "Get the balance of an ERC-20 token for an owner address",
            "ownerAddress",
        ),
        token_balance(
            services,
            "get_token_balance_erc20",
            "Get ERC-20 token balance for an address",
            "ownerAddress",
        ),
        tool(
            services,
            "get_token_info",
            "Get name, symbol, decimals and total supply of an ERC-20 token",
            InputSchema::new(vec![Field::string("tokenAddress", "ERC-20 token contract")], vec![network()]),
            |s, a: TokenArgs| async move { s.token_info(&a.token_address, a.network.as_ref()).await },
        ),
        tool(
            services,
            "get_transaction",
            "Get a transaction by its hash",
            InputSchema::new(vec![hash("hash", "Transaction hash")], vec![network()]),
            |s, a: HashArgs| async move { s.transaction(parse_hash(&a.hash)?, a.network.as_ref()).await },
        ),
        tool(
            services,
            "get_transaction_receipt",
            "Get the receipt of a mined transaction",
            InputSchema::new(vec![hash("hash", "Transaction hash")], vec![network()]),
            |s, a: HashArgs| async move {
                s.transaction_receipt(parse_hash(&a.hash)?, a.network.as_ref())
                    .await
            },
        ),
        tool(
            services,
            "get_transaction_count",
            "Get the number of transactions sent from an address",
            InputSchema::new(vec![Field::string("address", "Account address")], vec![network()]),
            |s, a: AddressArgs| async move {
                let count = s.transaction_count(&a.address, a.network.as_ref()).await?;
                Ok::<_, Error>(json!({ "address": a.address, "count": count }))
            },
        ),
        tool(
            services,
            "estimate_gas",
            "Estimate the gas a transaction would use",
            InputSchema::new(
                vec![Field::string("to", "Recipient address")],
                vec![
                    Field::string("value", "Amount of S to send, e.g. '0.1'"),
                    Field::string("data", "Calldata as hex"),
                    network(),
                ],
            ),
            |s, a: GasArgs| async move {
                let gas = s.estimate_gas(&a.params, a.network.as_ref()).await?;
                Ok::<_, Error>(json!({ "estimatedGas": gas.to_string() }))
            },
        ),
        tool(
            services,
            "transfer_native",
            "Transfer native S to an address",
            InputSchema::new(
                vec![Field::string("to", "Recipient address"), amount("Amount of S, e.g. '0.1'")],
                vec![private_key(), network()],
            ),
            |s, a: NativeTransferArgs| async move {
                let secret = s.secret(a.private_key.as_deref())?;
                let hash = s
                    .transfer_native(&secret, &a.to, &a.amount, a.network.as_ref())
                    .await?;
                Ok::<_, Error>(json!({ "txHash": hash, "to": a.to, "amount": a.amount }))
            },
        ),
        token_transfer(services, "transfer_erc20", "Transfer ERC-20 tokens to an address"),
        token_transfer(services, "transfer_token", "Transfer ERC-20 tokens to an address"),
        tool(
            services,
            "approve_token_spending",
            "Approve another address to spend your ERC-20 tokens",
            InputSchema::new(
                vec![
                    Field::string("tokenAddress", "ERC-20 token contract"),
                    Field::string("spenderAddress", "Address allowed to spend"),
                    amount("Allowance in token units, e.g. '1000'"),
                ],
                vec![private_key(), network()],
            ),
            |s, a: TokenTransferArgs| async move {
                let secret = s.secret(a.private_key.as_deref())?;
                s.approve_erc20(&secret, &a.token_address, &a.to_address, &a.amount, a.network.as_ref())
                    .await
            },
        ),
        tool(
            services,
            "read_contract",
            "Call a view or pure contract function",
            InputSchema::new(
                vec![
                    Field::string("contractAddress", "Contract address"),
                    Field::new("abi", FieldType::Any, "JSON ABI array (or its string form)"),
                    Field::string("functionName", "Function to call"),
                ],
                vec![
                    Field::new("args", FieldType::Array(Box::new(FieldType::Any)), "Positional arguments"),
                    network(),
                ],
            ),
            |s, a: ReadContractArgs| async move { s.read_contract(&a.call, a.network.as_ref()).await },
        ),
        tool(
            services,
            "write_contract",
            "Sign and submit a state-changing contract call",
            InputSchema::new(
                vec![
                    Field::string("contractAddress", "Contract address"),
                    Field::new("abi", FieldType::Any, "JSON ABI array (or its string form)"),
                    Field::string("functionName", "Function to call"),
                ],
                vec![
                    Field::new("args", FieldType::Array(Box::new(FieldType::Any)), "Positional arguments"),
                    private_key(),
                    network(),
                ],
            ),
            |s, a: WriteContractArgs| async move {
                let secret = s.secret(a.private_key.as_deref())?;
                let hash = s.write_contract(&secret, &a.call, a.network.as_ref()).await?;
                Ok::<_, Error>(json!({ "txHash": hash }))
            },
        ),
        tool(
            services,
            "is_contract",
            "Check whether an address is a contract or an externally owned account",
            InputSchema::new(vec![Field::string("address", "Address to check")], vec![network()]),
            |s, a: AddressArgs| async move {
                let is_contract = s.is_contract(&a.address, a.network.as_ref()).await?;
                Ok::<_, Error>(json!({ "address": a.address, "isContract": is_contract }))
            },
        ),
        tool(
            services,
            "get_address_from_private_key",
            "Derive the account address controlled by a private key",
            InputSchema::new(vec![], vec![private_key()]),
            |s, a: KeyArgs| async move {
                let secret = s.secret(a.private_key.as_deref())?;
                Ok::<_, Error>(json!({ "address": derive_address(&secret)?.to_checksum(None) }))
            },
        ),
    ];

    for descriptor in tools {
        builder.register(descriptor)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;
    use crate::capability::{CapabilityKind, CapabilityRegistry};
    use crate::services::testing::mock_services;

    const ANVIL_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn registry() -> (CapabilityRegistry, std::sync::Arc<crate::chain::testing::MockConnector>) {
        let (services, connector) = mock_services();
        let mut builder = RegistryBuilder::new();
        register_tools(&mut builder, &services).expect("register");
        (builder.build(), connector)
    }

    #[test]
    fn registers_every_tool_once() {
        let (registry, _) = registry();
        let names: Vec<String> = registry
            .list(CapabilityKind::Tool)
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names.len(), 22);
        for expected in [
            "get_balance",
            "write_contract",
            "get_address_from_private_key",
            "estimate_gas",
            "transfer_token",
            "get_token_balance_erc20",
        ] {
            assert!(names.iter().any(|n| n == expected), "{expected}");
        }
    }

    #[tokio::test]
    async fn get_balance_on_testnet() {
        let (registry, connector) = registry();
        connector
            .asserter
            .push_success(&U256::from(1_000_000_000_000_000_000_u128));
        let data = registry
            .invoke(
                CapabilityKind::Tool,
                "get_balance",
                json!({ "address": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266", "network": "testnet" }),
            )
            .await
            .expect("balance");
        assert_eq!(data, json!({ "wei": "1000000000000000000", "formatted": "1" }));
        assert_eq!(connector.reads(), 1);
    }

    #[tokio::test]
    async fn write_contract_with_bad_key_is_an_invalid_credential() {
        let (registry, connector) = registry();
        let err = registry
            .invoke(
                CapabilityKind::Tool,
                "write_contract",
                json!({
                    "contractAddress": "0x29219dd400f2bf60e5a23d13be72b486d4038894",
                    "abi": [],
                    "functionName": "transfer",
                    "args": [],
                    "privateKey": "0xnot-a-key",
                }),
            )
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::InvalidCredential(_)));
        assert!(!err.to_string().contains("not-a-key"));
        assert_eq!(connector.signings(), 0);
    }

    #[tokio::test]
    async fn address_derivation_returns_only_the_address() {
        let (registry, _) = registry();
        let data = registry
            .invoke(
                CapabilityKind::Tool,
                "get_address_from_private_key",
                json!({ "privateKey": ANVIL_KEY }),
            )
            .await
            .expect("address");
        assert_eq!(
            data,
            json!({ "address": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266" })
        );
        assert!(!data.to_string().contains(ANVIL_KEY));
    }

    #[tokio::test]
    async fn token_aliases_share_the_erc20_services() {
        let (registry, connector) = registry();
        let err = registry
            .invoke(
                CapabilityKind::Tool,
                "transfer_token",
                json!({
                    "tokenAddress": "0x29219dd400f2bf60e5a23d13be72b486d4038894",
                    "toAddress": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
                    "amount": "1",
                    "privateKey": "0xnot-a-key",
                }),
            )
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::InvalidCredential(_)));

        let err = registry
            .invoke(
                CapabilityKind::Tool,
                "get_token_balance_erc20",
                json!({ "tokenAddress": "0x29219dd400f2bf60e5a23d13be72b486d4038894" }),
            )
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::InvalidInput(ref m) if m.contains("ownerAddress")), "{err}");
        assert_eq!(connector.signings(), 0);
        assert_eq!(connector.reads(), 0);
    }

    #[tokio::test]
    async fn schema_rejects_before_services_run() {
        let (registry, connector) = registry();
        let err = registry
            .invoke(CapabilityKind::Tool, "get_block_by_number", json!({ "blockNumber": "ten" }))
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = registry
            .invoke(CapabilityKind::Tool, "get_transaction", json!({ "hash": "0x12" }))
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(connector.reads(), 0);
    }

    #[tokio::test]
    async fn supported_networks_lists_aliases() {
        let (registry, _) = registry();
        let data = registry
            .invoke(CapabilityKind::Tool, "get_supported_networks", Value::Null)
            .await
            .expect("networks");
        assert_eq!(data["supportedNetworks"], json!(["mainnet", "testnet"]));
        assert_eq!(data["defaultNetwork"], "testnet");
    }
}
