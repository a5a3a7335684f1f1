//! Chain-specific types and error definitions.

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use thiserror::Error;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur in chain-facing helpers.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// Invalid private key format or signing failure.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Not a `0x`-prefixed 20-byte hex address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Not a `0x`-prefixed 32-byte hex transaction hash.
    #[error("Invalid transaction hash: {0}")]
    InvalidHash(String),

    /// JSON-RPC call failed or no endpoint is configured.
    #[error("RPC error: {0}")]
    Rpc(String),
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// Length of a `0x`-prefixed transaction hash.
pub const TX_HASH_LEN: usize = 66;

/// Parse a `0x`-prefixed EVM address. Checksums are not enforced.
pub fn parse_address(value: &str) -> BlockchainResult<Address> {
    let hex = value
        .strip_prefix("0x")
        .ok_or_else(|| BlockchainError::InvalidAddress(value.to_string()))?;
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(BlockchainError::InvalidAddress(value.to_string()));
    }
    value
        .parse()
        .map_err(|_| BlockchainError::InvalidAddress(value.to_string()))
}

/// Whether `value` looks like a transaction hash: `0x` plus 64 hex digits.
pub fn is_tx_hash(value: &str) -> bool {
    value.len() == TX_HASH_LEN
        && value
            .strip_prefix("0x")
            .is_some_and(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Block explorer link for a transaction.
pub fn explorer_tx_url(explorer_base: &str, tx_hash: &str) -> String {
    format!("{}/tx/{}", explorer_base.trim_end_matches('/'), tx_hash)
}

/// Token amount for `raw` base units of a token with `decimals` places.
///
/// `None` when the value does not fit a `Decimal`.
pub fn from_base_units(raw: U256, decimals: u32) -> Option<Decimal> {
    let raw = i128::try_from(u128::try_from(raw).ok()?).ok()?;
    Decimal::try_from_i128_with_scale(raw, decimals).ok()
}
