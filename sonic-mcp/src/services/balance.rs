use alloy_primitives::{Address, U256};
use alloy_provider::Provider;
use serde::Serialize;

use super::Services;
use super::address::resolve_address;
use super::tokens::{IERC20, call_view, format_token_amount};
use super::units::{decimal, format_amount};
use crate::chain::NetworkIdentifier;
use crate::error::Error;

/// Native-currency balance.
#[derive(Debug, Clone, Serialize)]
pub struct NativeBalance {
    /// Balance in wei.
    #[serde(serialize_with = "decimal")]
    pub wei: U256,
    /// Balance in whole units, trailing zeros trimmed.
    pub formatted: String,
}

/// Symbol and precision of an ERC-20 token.
#[derive(Debug, Clone, Serialize)]
pub struct TokenMeta {
    /// Ticker symbol.
    pub symbol: String,
    /// Decimal precision.
    pub decimals: u8,
}

/// ERC-20 balance of one holder.
#[derive(Debug, Clone, Serialize)]
pub struct TokenBalance {
    /// Balance in base units.
    #[serde(serialize_with = "decimal")]
    pub raw: U256,
    /// Balance scaled by the token's decimals.
    pub formatted: String,
    /// Token metadata.
    pub token: TokenMeta,
}

impl Services {
    /// Native balance of `address`.
    ///
    /// # Errors
    ///
    /// Address, resolution or transport failures.
    pub async fn native_balance(
        &self,
        address: &str,
        network: Option<&NetworkIdentifier>,
    ) -> Result<NativeBalance, Error> {
        let address = resolve_address(address)?;
        let network = self.network(network);
        let client = self.reader(network)?;
        let wei = client
            .provider
            .get_balance(address)
            .await
            .map_err(|e| Error::transport("native_balance", network, address, e))?;
        let decimals = self
            .clients
            .chains()
            .describe(client.chain_id)
            .native_currency
            .decimals;
        let formatted = format_amount(wei, decimals).ok_or_else(|| {
            Error::transport("native_balance", network, address, "unformattable balance")
        })?;
        Ok(NativeBalance { wei, formatted })
    }

    /// ERC-20 balance of `owner`.
    ///
    /// `symbol`, `decimals` and `balanceOf` are read concurrently; if any of
    /// them fails no partial result is returned.
    ///
    /// # Errors
    ///
    /// Address or resolution failures, or [`Error::ContractRead`].
    pub async fn erc20_balance(
        &self,
        token: &str,
        owner: &str,
        network: Option<&NetworkIdentifier>,
    ) -> Result<TokenBalance, Error> {
        const OP: &str = "erc20_balance";
        let token = resolve_address(token)?;
        let owner = resolve_address(owner)?;
        let network = self.network(network);
        let client = self.reader(network)?;

        let (symbol, decimals, raw) = tokio::try_join!(
            call_view(&client, token, IERC20::symbolCall {}, OP, network),
            call_view(&client, token, IERC20::decimalsCall {}, OP, network),
            call_view(&client, token, IERC20::balanceOfCall { account: owner }, OP, network),
        )?;

        Ok(TokenBalance {
            raw,
            formatted: format_token_amount(raw, decimals, token, OP, network)?,
            token: TokenMeta { symbol, decimals },
        })
    }

    /// Symbol and decimals of a token, read concurrently.
    pub(super) async fn token_meta(
        &self,
        token: Address,
        operation: &'static str,
        network: &NetworkIdentifier,
    ) -> Result<TokenMeta, Error> {
        let client = self.reader(network)?;
        let (symbol, decimals) = tokio::try_join!(
            call_view(&client, token, IERC20::symbolCall {}, operation, network),
            call_view(&client, token, IERC20::decimalsCall {}, operation, network),
        )?;
        Ok(TokenMeta { symbol, decimals })
    }
}
