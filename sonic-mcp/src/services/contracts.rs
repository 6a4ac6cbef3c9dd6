use alloy_dyn_abi::FunctionExt;
use alloy_network::TransactionBuilder;
use alloy_primitives::B256;
use alloy_provider::Provider;
use alloy_rpc_types_eth::TransactionRequest;
use serde_json::Value;

use super::Services;
use super::abi::{ContractCall, outputs_to_json};
use super::address::resolve_address;
use crate::chain::NetworkIdentifier;
use crate::error::Error;
use crate::signers::SecretKey;

impl Services {
    /// Calls a view function and returns its decoded outputs.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a bad ABI or arguments, or
    /// [`Error::ContractRead`] if the call reverts or cannot be decoded.
    pub async fn read_contract(
        &self,
        call: &ContractCall,
        network: Option<&NetworkIdentifier>,
    ) -> Result<Value, Error> {
        let to = resolve_address(&call.contract_address)?;
        let (function, data) = call.encode()?;
        let network = self.network(network);
        let client = self.reader(network)?;
        let target = format!("{to}.{}", call.function_name);
        let request = TransactionRequest::default().with_to(to).with_input(data);
        let output = client
            .provider
            .call(request)
            .await
            .map_err(|e| Error::contract_read("read_contract", network, &target, e))?;
        let decoded = function
            .abi_decode_output(&output)
            .map_err(|e| Error::contract_read("read_contract", network, &target, e))?;
        Ok(outputs_to_json(&decoded))
    }

    /// Signs and submits a state-changing call. Returns the transaction hash
    /// without waiting for it to be mined.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCredential`] before anything else if the key is
    /// malformed; input, resolution or transport failures otherwise.
    pub async fn write_contract(
        &self,
        secret: &SecretKey,
        call: &ContractCall,
        network: Option<&NetworkIdentifier>,
    ) -> Result<B256, Error> {
        let network = self.network(network);
        let client = self.clients.signing_client(secret, network)?;
        let to = resolve_address(&call.contract_address)?;
        let (_, data) = call.encode()?;
        let request = TransactionRequest::default().with_to(to).with_input(data);
        let pending = client
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| Error::transport("write_contract", network, to, e))?;
        let hash = *pending.tx_hash();
        tracing::info!(chain_id = client.chain_id, from = %client.address, %to, %hash, "submitted contract call");
        Ok(hash)
    }

    /// Whether `address` holds deployed bytecode.
    ///
    /// # Errors
    ///
    /// Address, resolution or transport failures.
    pub async fn is_contract(
        &self,
        address: &str,
        network: Option<&NetworkIdentifier>,
    ) -> Result<bool, Error> {
        let address = resolve_address(address)?;
        let network = self.network(network);
        let code = self
            .reader(network)?
            .provider
            .get_code_at(address)
            .await
            .map_err(|e| Error::transport("is_contract", network, address, e))?;
        Ok(!code.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use alloy_dyn_abi::DynSolValue;
    use alloy_primitives::{Bytes, U256};
    use serde_json::json;

    use super::*;
    use crate::services::testing::mock_services;

    fn balance_of() -> ContractCall {
        ContractCall {
            contract_address: "0x29219dd400f2bf60e5a23d13be72b486d4038894".into(),
            abi: json!([{
                "type": "function",
                "name": "balanceOf",
                "stateMutability": "view",
                "inputs": [{ "name": "account", "type": "address" }],
                "outputs": [{ "name": "", "type": "uint256" }]
            }]),
            function_name: "balanceOf".into(),
            args: vec![json!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")],
        }
    }

    #[tokio::test]
    async fn read_contract_decodes_single_output() {
        let (services, connector) = mock_services();
        let encoded = DynSolValue::Tuple(vec![DynSolValue::Uint(U256::from(1234), 256)]).abi_encode_params();
        connector.asserter.push_success(&Bytes::from(encoded));
        let value = services
            .read_contract(&balance_of(), None)
            .await
            .expect("read");
        assert_eq!(value, json!("1234"));
    }

    #[tokio::test]
    async fn reverted_read_is_a_contract_read_error() {
        let (services, connector) = mock_services();
        connector.asserter.push_failure_msg("execution reverted");
        let err = services
            .read_contract(&balance_of(), Some(&"mainnet".into()))
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::ContractRead { operation: "read_contract", .. }));
    }

    #[tokio::test]
    async fn invalid_secret_fails_before_any_client_exists() {
        let (services, connector) = mock_services();
        let err = services
            .write_contract(&SecretKey::new("0x1234"), &balance_of(), None)
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::InvalidCredential(_)));
        assert_eq!(connector.signings(), 0);
        assert_eq!(connector.reads(), 0);
        assert!(services.clients().cached_chain_ids().is_empty());
    }

    #[tokio::test]
    async fn contract_detection_checks_for_code() {
        let (services, connector) = mock_services();
        let account = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

        connector.asserter.push_success(&Bytes::new());
        assert_eq!(services.is_contract(account, None).await.ok(), Some(false));

        connector
            .asserter
            .push_success(&Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]));
        assert_eq!(services.is_contract(account, None).await.ok(), Some(true));
    }
}
