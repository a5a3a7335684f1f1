//! Payment error taxonomy.
//!
//! Transport failures are classified into these variants at the transport
//! boundary. The coordinator only ever stores and returns `PaymentError`.

use thiserror::Error;

use crate::payments::types::PaymentState;

/// Everything that can go wrong with a payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// No signer is bound to the transport.
    #[error("Wallet not connected")]
    WalletNotConnected,

    /// The signer declined to sign the request.
    #[error("User rejected the payment request")]
    UserRejected,

    /// The endpoint or signer reported a balance shortfall.
    #[error("Insufficient balance to complete payment")]
    InsufficientFunds,

    /// The endpoint escalated: a follow-up payment is needed first.
    #[error("Payment required: {amount} due at {payment_url}")]
    PaymentRequired { amount: String, payment_url: String },

    /// A status query failed. Transient.
    #[error("Failed to check payment status: {0}")]
    StatusCheckFailed(String),

    /// The transaction failed on chain.
    #[error("Transaction {0} failed on chain")]
    TransactionFailed(String),

    /// Submission failed for any other reason; carries the raw cause.
    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    /// The request failed local or endpoint validation.
    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),

    /// The coordinator cannot accept the call in its current state.
    #[error("Payment already in progress ({0})")]
    InvalidState(PaymentState),

    /// No terminal status within the configured poll window.
    #[error("Transaction not confirmed within {0} seconds")]
    ConfirmationTimeout(u64),

    /// The attempt was reset while its submission was in flight.
    #[error("Payment attempt was reset before submission completed")]
    Superseded,
}

impl PaymentError {
    /// Stable machine-readable code for UI collaborators.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::WalletNotConnected => "WALLET_NOT_CONNECTED",
            PaymentError::UserRejected => "USER_REJECTED",
            PaymentError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            PaymentError::PaymentRequired { .. } => "PAYMENT_REQUIRED",
            PaymentError::StatusCheckFailed(_) => "STATUS_CHECK_FAILED",
            PaymentError::TransactionFailed(_) => "TRANSACTION_FAILED",
            PaymentError::PaymentFailed(_) => "PAYMENT_FAILED",
            PaymentError::InvalidRequest(_) => "INVALID_REQUEST",
            PaymentError::InvalidState(_) => "INVALID_STATE",
            PaymentError::ConfirmationTimeout(_) => "CONFIRMATION_TIMEOUT",
            PaymentError::Superseded => "SUPERSEDED",
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::StatusCheckFailed(_))
    }

    /// Escalations and validation failures end the attempt without marking it failed.
    pub fn leaves_coordinator_idle(&self) -> bool {
        matches!(
            self,
            PaymentError::PaymentRequired { .. } | PaymentError::InvalidRequest(_)
        )
    }
}
