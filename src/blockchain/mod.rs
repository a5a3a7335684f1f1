//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key)
//!     → wallet.rs (key loading, message signing, fee estimation,
//!                  ERC-20 balanceOf over JSON-RPC)
//!     → payments::signer (consumed through the SignerAdapter trait)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data

pub mod types;
pub mod wallet;

pub use types::{BlockchainError, BlockchainResult, ChainId};
pub use wallet::Wallet;
