//! Local private-key wallet.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized

use alloy::primitives::{Address, U256};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, Signer};
use alloy::sol;
use async_trait::async_trait;
use rust_decimal::Decimal;
use url::Url;

use crate::blockchain::types::{BlockchainError, BlockchainResult, ChainId};
use crate::payments::signer::{SignerAdapter, SignerError};
use crate::payments::types::PaymentRequest;

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "X402_PAY_PRIVATE_KEY";

/// Gas used by an ERC-20 `transfer`.
pub const ERC20_TRANSFER_GAS: u64 = 65_000;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
    }
}

/// Wallet backed by an in-memory private key.
#[derive(Debug, Clone)]
pub struct Wallet {
    /// The underlying signer (private key).
    signer: PrivateKeySigner,
    /// Chain ID for EIP-155 replay protection.
    chain_id: ChainId,
    /// Gas limit used for fee estimates.
    gas_limit: u64,
    /// Gas price used for fee estimates, in gwei.
    gas_price_gwei: Decimal,
    /// JSON-RPC endpoint for token balance reads.
    rpc_url: Option<Url>,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    /// * `chain_id` - Chain ID for message signing
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> BlockchainResult<Self> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;
        let signer = signer.with_chain_id(Some(chain_id));

        tracing::info!(
            address = %signer.address(),
            chain_id = chain_id,
            "Wallet initialized"
        );

        Ok(Self {
            signer,
            chain_id: ChainId(chain_id),
            gas_limit: ERC20_TRANSFER_GAS,
            // Typical Base L2 price
            gas_price_gwei: Decimal::new(5, 2),
            rpc_url: None,
        })
    }

    /// Load wallet from environment variable.
    ///
    /// Reads `X402_PAY_PRIVATE_KEY` from environment.
    pub fn from_env(chain_id: u64) -> BlockchainResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            BlockchainError::Wallet(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key, chain_id)
    }

    /// Override the gas model used by [`SignerAdapter::estimate_fee`].
    pub fn with_gas_model(mut self, gas_limit: u64, gas_price_gwei: Decimal) -> Self {
        self.gas_limit = gas_limit;
        self.gas_price_gwei = gas_price_gwei;
        self
    }

    /// Read token balances over JSON-RPC at `rpc_url`.
    pub fn with_rpc_url(mut self, rpc_url: Url) -> Self {
        self.rpc_url = Some(rpc_url);
        self
    }

    /// Get the wallet's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Get the chain ID this wallet is configured for.
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Sign arbitrary message bytes (with Ethereum prefix).
    pub async fn sign_message(&self, message: &[u8]) -> BlockchainResult<Signature> {
        self.signer
            .sign_message(message)
            .await
            .map_err(|e| BlockchainError::Wallet(format!("Message signing failed: {}", e)))
    }

    /// Raw `balanceOf` of this wallet on the ERC-20 contract at `token`.
    pub async fn token_balance(&self, token: Address) -> BlockchainResult<U256> {
        let rpc_url = self
            .rpc_url
            .clone()
            .ok_or_else(|| BlockchainError::Rpc("no RPC endpoint configured".to_string()))?;

        let provider = ProviderBuilder::new().connect_http(rpc_url);
        let contract = IERC20::new(token, provider);
        let balance = contract
            .balanceOf(self.address())
            .call()
            .await
            .map_err(|e| BlockchainError::Rpc(format!("balanceOf failed: {}", e)))?;

        tracing::debug!(token = %token, owner = %self.address(), balance = %balance, "Token balance read");
        Ok(balance)
    }

    /// Fee for one transfer under the configured gas model, in ETH.
    pub fn transfer_fee(&self) -> Decimal {
        let gwei_per_eth = Decimal::new(1_000_000_000, 0);
        (Decimal::from(self.gas_limit) * self.gas_price_gwei / gwei_per_eth).normalize()
    }
}

#[async_trait]
impl SignerAdapter for Wallet {
    fn address(&self) -> Address {
        Wallet::address(self)
    }

    async fn sign(&self, message: &[u8]) -> Result<Signature, SignerError> {
        self.sign_message(message)
            .await
            .map_err(|e| SignerError::Other(e.to_string()))
    }

    async fn estimate_fee(&self, _request: &PaymentRequest) -> Result<Decimal, SignerError> {
        Ok(self.transfer_fee())
    }

    async fn token_balance(&self, token: Address) -> Result<U256, SignerError> {
        Wallet::token_balance(self, token)
            .await
            .map_err(|e| SignerError::Other(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // Well-known test private key (Anvil's first account)
    pub(crate) const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    pub(crate) fn test_wallet() -> Wallet {
        Wallet::from_private_key(TEST_PRIVATE_KEY, 8453).unwrap()
    }

    #[test]
    fn test_wallet_from_private_key() {
        let wallet = test_wallet();
        assert_eq!(
            wallet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
        assert_eq!(wallet.chain_id(), ChainId(8453));
    }

    #[test]
    fn test_wallet_with_0x_prefix() {
        let wallet = Wallet::from_private_key(&format!("0x{}", TEST_PRIVATE_KEY), 1).unwrap();
        assert_eq!(
            wallet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_invalid_private_key() {
        let result = Wallet::from_private_key("invalid_key", 1);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid private key"));
    }

    #[tokio::test]
    async fn test_sign_message_recovers_to_wallet() {
        let wallet = test_wallet();
        let message = b"Payment request: {}";
        let signature = wallet.sign_message(message).await.unwrap();
        assert_eq!(signature.as_bytes().len(), 65);

        let recovered = signature.recover_address_from_msg(message).unwrap();
        assert_eq!(recovered, wallet.address());
    }

    #[tokio::test]
    async fn test_fee_estimate_uses_gas_model() {
        let wallet = test_wallet().with_gas_model(21_000, dec!(1));
        let request = PaymentRequest::new("1", "0x742d35Cc6634C0532925a3b8D4C9db96590c6C8B");
        let fee = SignerAdapter::estimate_fee(&wallet, &request).await.unwrap();
        assert_eq!(fee, dec!(0.000021));
    }

    #[tokio::test]
    async fn test_token_balance_needs_rpc_endpoint() {
        let token: Address = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".parse().unwrap();
        let err = test_wallet().token_balance(token).await.unwrap_err();
        assert!(matches!(err, BlockchainError::Rpc(_)));
        assert!(err.to_string().contains("no RPC endpoint"));
    }
}
