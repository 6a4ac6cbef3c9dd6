//! ERC-20 bindings and metadata reads.

use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, U256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::TransactionRequest;
use alloy_sol_types::{SolCall, sol};
use serde::Serialize;

use super::Services;
use super::address::resolve_address;
use super::units::{decimal, format_amount};
use crate::chain::{NetworkIdentifier, ReadClient};
use crate::error::Error;

sol! {
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

/// Token metadata returned by [`Services::token_info`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    /// Token contract.
    pub address: Address,
    /// Token name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Decimal precision.
    pub decimals: u8,
    /// Total supply in base units.
    #[serde(serialize_with = "decimal")]
    pub total_supply: U256,
    /// Total supply scaled by `decimals`.
    pub formatted_total_supply: String,
}

/// Issues an `eth_call` for a typed ERC-20 view and decodes its return value.
pub(super) async fn call_view<C>(
    client: &ReadClient,
    token: Address,
    call: C,
    operation: &'static str,
    network: &NetworkIdentifier,
) -> Result<C::Return, Error>
where
    C: SolCall + Send,
{
    let request = TransactionRequest::default()
        .with_to(token)
        .with_input(call.abi_encode());
    let output = client
        .provider
        .call(request)
        .await
        .map_err(|e| Error::contract_read(operation, network, token, format!("{}: {e}", C::SIGNATURE)))?;
    C::abi_decode_returns(&output)
        .map_err(|e| Error::contract_read(operation, network, token, format!("{}: {e}", C::SIGNATURE)))
}

/// Scales `amount` by `decimals`, treating an out-of-range precision as a
/// malformed contract response.
pub(super) fn format_token_amount(
    amount: U256,
    decimals: u8,
    token: Address,
    operation: &'static str,
    network: &NetworkIdentifier,
) -> Result<String, Error> {
    format_amount(amount, decimals).ok_or_else(|| {
        Error::contract_read(operation, network, token, format!("unsupported decimals {decimals}"))
    })
}

impl Services {
    /// Name, symbol, decimals and total supply of an ERC-20 token.
    ///
    /// All four reads are issued concurrently; any failure fails the whole
    /// operation.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedAddressFormat`], a resolution error, or
    /// [`Error::ContractRead`].
    pub async fn token_info(
        &self,
        token: &str,
        network: Option<&NetworkIdentifier>,
    ) -> Result<TokenInfo, Error> {
        const OP: &str = "token_info";
        let token = resolve_address(token)?;
        let network = self.network(network);
        let client = self.reader(network)?;

        let (name, symbol, decimals, total_supply) = tokio::try_join!(
            call_view(&client, token, IERC20::nameCall {}, OP, network),
            call_view(&client, token, IERC20::symbolCall {}, OP, network),
            call_view(&client, token, IERC20::decimalsCall {}, OP, network),
            call_view(&client, token, IERC20::totalSupplyCall {}, OP, network),
        )?;

        Ok(TokenInfo {
            address: token,
            name,
            symbol,
            decimals,
            formatted_total_supply: format_token_amount(total_supply, decimals, token, OP, network)?,
            total_supply,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Bytes;

    use super::*;
    use crate::services::testing::mock_services;

    const TOKEN: &str = "0x29219dd400f2bf60e5a23d13be72b486d4038894";

    #[tokio::test]
    async fn one_failed_read_fails_token_info() {
        let (services, connector) = mock_services();
        connector
            .asserter
            .push_success(&Bytes::from(IERC20::nameCall::abi_encode_returns(&"USD Coin".to_string())));
        connector
            .asserter
            .push_success(&Bytes::from(IERC20::symbolCall::abi_encode_returns(&"USDC".to_string())));
        connector
            .asserter
            .push_success(&Bytes::from(IERC20::decimalsCall::abi_encode_returns(&6)));
        connector.asserter.push_failure_msg("execution reverted");

        let result = services.token_info(TOKEN, None).await;
        let Err(err) = result else {
            panic!("partial token info returned: {result:?}");
        };
        assert!(matches!(err, Error::ContractRead { operation: "token_info", .. }), "{err}");
    }

    #[tokio::test]
    async fn token_address_is_validated_before_any_call() {
        let (services, connector) = mock_services();
        let err = services
            .token_info("usdc.sonic", None)
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::UnsupportedAddressFormat(_)));
        assert_eq!(connector.reads(), 0);
    }
}
