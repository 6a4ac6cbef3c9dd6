use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, B256, U256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::TransactionRequest;
use alloy_sol_types::SolCall;
use serde::Serialize;

use super::Services;
use super::address::resolve_address;
use super::balance::TokenMeta;
use super::tokens::{IERC20, format_token_amount};
use super::units::{decimal, parse_amount};
use crate::chain::{NetworkIdentifier, SigningClient};
use crate::error::Error;
use crate::signers::SecretKey;

/// Amount moved by a token transfer or approval.
#[derive(Debug, Clone, Serialize)]
pub struct TransferAmount {
    /// Base units.
    #[serde(serialize_with = "decimal")]
    pub raw: U256,
    /// Whole units as given by the caller, normalized.
    pub formatted: String,
}

/// Result of an ERC-20 `transfer` or `approve` submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    /// Submitted transaction hash.
    pub tx_hash: B256,
    /// Amount in both representations.
    pub amount: TransferAmount,
    /// Token metadata used to scale the amount.
    pub token: TokenMeta,
}

impl Services {
    /// Sends `amount` whole native units to `to`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCredential`] first for a malformed key; then input,
    /// resolution or transport failures.
    pub async fn transfer_native(
        &self,
        secret: &SecretKey,
        to: &str,
        amount: &str,
        network: Option<&NetworkIdentifier>,
    ) -> Result<B256, Error> {
        let network = self.network(network);
        let client = self.clients.signing_client(secret, network)?;
        let to = resolve_address(to)?;
        let decimals = self
            .clients
            .chains()
            .describe(client.chain_id)
            .native_currency
            .decimals;
        let value = parse_amount(amount, decimals)?;
        let request = TransactionRequest::default().with_to(to).with_value(value);
        submit(&client, request, to, "transfer_native", network).await
    }

    /// Transfers `amount` tokens, scaled by the token's decimals, to `to`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCredential`] first for a malformed key; then input,
    /// resolution, contract read or transport failures.
    pub async fn transfer_erc20(
        &self,
        secret: &SecretKey,
        token: &str,
        to: &str,
        amount: &str,
        network: Option<&NetworkIdentifier>,
    ) -> Result<TokenTransfer, Error> {
        self.token_write(secret, token, to, amount, TokenAction::Transfer, network)
            .await
    }

    /// Approves `spender` to move `amount` tokens on the signer's behalf.
    ///
    /// # Errors
    ///
    /// As [`Services::transfer_erc20`].
    pub async fn approve_erc20(
        &self,
        secret: &SecretKey,
        token: &str,
        spender: &str,
        amount: &str,
        network: Option<&NetworkIdentifier>,
    ) -> Result<TokenTransfer, Error> {
        self.token_write(secret, token, spender, amount, TokenAction::Approve, network)
            .await
    }

    async fn token_write(
        &self,
        secret: &SecretKey,
        token: &str,
        counterparty: &str,
        amount: &str,
        action: TokenAction,
        network: Option<&NetworkIdentifier>,
    ) -> Result<TokenTransfer, Error> {
        let operation = action.operation();
        let network = self.network(network);
        let client = self.clients.signing_client(secret, network)?;
        let token = resolve_address(token)?;
        let counterparty = resolve_address(counterparty)?;

        let meta = self.token_meta(token, operation, network).await?;
        let raw = parse_amount(amount, meta.decimals)?;
        let request = TransactionRequest::default()
            .with_to(token)
            .with_input(action.calldata(counterparty, raw));
        let tx_hash = submit(&client, request, token, operation, network).await?;

        Ok(TokenTransfer {
            tx_hash,
            amount: TransferAmount {
                raw,
                formatted: format_token_amount(raw, meta.decimals, token, operation, network)?,
            },
            token: meta,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum TokenAction {
    Transfer,
    Approve,
}

impl TokenAction {
    const fn operation(self) -> &'static str {
        match self {
            Self::Transfer => "transfer_erc20",
            Self::Approve => "approve_erc20",
        }
    }

    fn calldata(self, counterparty: Address, amount: U256) -> Vec<u8> {
        match self {
            Self::Transfer => IERC20::transferCall {
                to: counterparty,
                amount,
            }
            .abi_encode(),
            Self::Approve => IERC20::approveCall {
                spender: counterparty,
                amount,
            }
            .abi_encode(),
        }
    }
}

async fn submit(
    client: &SigningClient,
    request: TransactionRequest,
    target: Address,
    operation: &'static str,
    network: &NetworkIdentifier,
) -> Result<B256, Error> {
    let pending = client
        .provider
        .send_transaction(request)
        .await
        .map_err(|e| Error::transport(operation, network, target, e))?;
    let hash = *pending.tx_hash();
    tracing::info!(operation, chain_id = client.chain_id, from = %client.address, %hash, "submitted transaction");
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::mock_services;

    const RECIPIENT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const TOKEN: &str = "0x29219dd400f2bf60e5a23d13be72b486d4038894";
    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn calldata_uses_the_erc20_selectors() {
        let to: Address = RECIPIENT.parse().expect("address");
        let transfer = TokenAction::Transfer.calldata(to, U256::from(1));
        let approve = TokenAction::Approve.calldata(to, U256::from(1));
        assert_eq!(&transfer[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(&approve[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(transfer.len(), 68);
    }

    #[tokio::test]
    async fn malformed_key_rejects_every_mutation_up_front() {
        let (services, connector) = mock_services();
        let bad = SecretKey::new("not-a-key");
        assert!(matches!(
            services.transfer_native(&bad, RECIPIENT, "1", None).await,
            Err(Error::InvalidCredential(_))
        ));
        assert!(matches!(
            services.transfer_erc20(&bad, TOKEN, RECIPIENT, "1", None).await,
            Err(Error::InvalidCredential(_))
        ));
        assert!(matches!(
            services.approve_erc20(&bad, TOKEN, RECIPIENT, "1", None).await,
            Err(Error::InvalidCredential(_))
        ));
        assert_eq!(connector.signings(), 0);
    }

    #[tokio::test]
    async fn bad_recipient_or_amount_is_rejected_before_submission() {
        let (services, _connector) = mock_services();
        let key = SecretKey::new(KEY);
        assert!(matches!(
            services.transfer_native(&key, "alice.eth", "1", None).await,
            Err(Error::UnsupportedAddressFormat(_))
        ));
        assert!(matches!(
            services.transfer_native(&key, RECIPIENT, "-1", None).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
