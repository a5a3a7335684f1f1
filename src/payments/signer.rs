//! Signer adapter seam.
//!
//! The core never holds keys. It talks to whatever implements
//! [`SignerAdapter`]: a browser wallet bridge, a hardware signer, or the
//! local [`Wallet`](crate::blockchain::Wallet) used by the CLI and tests.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::signers::Signature;
use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::payments::error::PaymentError;
use crate::payments::types::PaymentRequest;

/// Errors a signer can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// The user declined the signature prompt.
    #[error("signature request rejected")]
    Rejected,

    /// The account cannot cover the payment or its fee.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("signer error: {0}")]
    Other(String),
}

impl From<SignerError> for PaymentError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Rejected => PaymentError::UserRejected,
            SignerError::InsufficientFunds(_) => PaymentError::InsufficientFunds,
            SignerError::Other(cause) if cause.to_lowercase().contains("insufficient funds") => {
                PaymentError::InsufficientFunds
            }
            SignerError::Other(cause) => PaymentError::PaymentFailed(cause),
        }
    }
}

/// External signing capability.
#[async_trait]
pub trait SignerAdapter: Send + Sync {
    /// Address the signatures recover to.
    fn address(&self) -> Address;

    /// Sign `message` (EIP-191 personal message semantics).
    async fn sign(&self, message: &[u8]) -> Result<Signature, SignerError>;

    /// Estimated network fee for settling `request`, in the native token.
    async fn estimate_fee(&self, request: &PaymentRequest) -> Result<Decimal, SignerError>;

    /// Balance of the ERC-20 contract at `token` held by [`address`](Self::address),
    /// in the token's base units.
    async fn token_balance(&self, token: Address) -> Result<U256, SignerError>;
}

/// A signer that may be shared by several coordinators.
///
/// Signing requests are serialized: at most one `sign` call reaches the
/// underlying adapter at a time.
pub struct SharedSigner {
    inner: Arc<dyn SignerAdapter>,
    gate: Mutex<()>,
}

impl SharedSigner {
    pub fn new(inner: Arc<dyn SignerAdapter>) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }

    pub fn address(&self) -> Address {
        self.inner.address()
    }

    pub async fn sign(&self, message: &[u8]) -> Result<Signature, SignerError> {
        let _guard = self.gate.lock().await;
        self.inner.sign(message).await
    }

    pub async fn estimate_fee(&self, request: &PaymentRequest) -> Result<Decimal, SignerError> {
        self.inner.estimate_fee(request).await
    }

    pub async fn token_balance(&self, token: Address) -> Result<U256, SignerError> {
        self.inner.token_balance(token).await
    }
}

impl std::fmt::Debug for SharedSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSigner")
            .field("address", &self.inner.address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records the highest number of overlapping `sign` calls.
    struct SlowSigner {
        active: AtomicUsize,
        peak: AtomicUsize,
        inner: crate::blockchain::Wallet,
    }

    #[async_trait]
    impl SignerAdapter for SlowSigner {
        fn address(&self) -> Address {
            self.inner.address()
        }

        async fn sign(&self, message: &[u8]) -> Result<Signature, SignerError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            SignerAdapter::sign(&self.inner, message).await
        }

        async fn estimate_fee(&self, _request: &PaymentRequest) -> Result<Decimal, SignerError> {
            Ok(Decimal::ZERO)
        }

        async fn token_balance(&self, _token: Address) -> Result<U256, SignerError> {
            Ok(U256::ZERO)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_signer_serializes_signing() {
        let slow = Arc::new(SlowSigner {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            inner: crate::blockchain::wallet::tests::test_wallet(),
        });
        let shared = Arc::new(SharedSigner::new(slow.clone()));

        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                tokio::spawn(async move { shared.sign(format!("msg {i}").as_bytes()).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(slow.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_signer_error_classification() {
        assert_eq!(PaymentError::from(SignerError::Rejected), PaymentError::UserRejected);
        assert_eq!(
            PaymentError::from(SignerError::InsufficientFunds("need 5".into())),
            PaymentError::InsufficientFunds
        );
        assert_eq!(
            PaymentError::from(SignerError::Other("RPC: insufficient funds for gas".into())),
            PaymentError::InsufficientFunds
        );
        assert_eq!(
            PaymentError::from(SignerError::Other("device locked".into())),
            PaymentError::PaymentFailed("device locked".into())
        );
    }
}
