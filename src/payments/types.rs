//! Payment data model and wire types.

use std::collections::BTreeMap;
use std::fmt;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blockchain::types::{parse_address, ChainId};
use crate::config::PolicyConfig;
use crate::payments::error::PaymentError;

/// Header carrying the payer's wallet address.
pub const HEADER_WALLET_ADDRESS: &str = "X-Wallet-Address";
/// Header carrying the signature over the canonical request message.
pub const HEADER_WALLET_SIGNATURE: &str = "X-Wallet-Signature";
/// Header carrying the chain ID the signature was made for.
pub const HEADER_CHAIN_ID: &str = "X-Chain-Id";

/// Identity of one payment attempt within a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of the coordinator's current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    #[default]
    Idle,
    Submitting,
    AwaitingConfirmation,
    Success,
    Failed,
}

impl PaymentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentState::Success | PaymentState::Failed)
    }

    /// Submitting or awaiting confirmation.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            PaymentState::Submitting | PaymentState::AwaitingConfirmation
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentState::Idle => "idle",
            PaymentState::Submitting => "submitting",
            PaymentState::AwaitingConfirmation => "awaiting_confirmation",
            PaymentState::Success => "success",
            PaymentState::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque transaction identifier returned by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHandle(String);

impl TransactionHandle {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A strictly positive stablecoin amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::InvalidRequest(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    /// Parse a human readable decimal string such as `"10.50"`.
    pub fn parse(value: &str) -> Result<Self, PaymentError> {
        let decimal: Decimal = value
            .trim()
            .parse()
            .map_err(|_| PaymentError::InvalidRequest(format!("'{value}' is not a decimal amount")))?;
        Self::new(decimal)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// `self * rate`, used for escalation fees.
    pub fn scaled(&self, rate: Decimal) -> Decimal {
        (self.0 * rate).normalize()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// What the caller wants to pay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Human readable amount, e.g. `"10.50"`.
    pub amount: String,
    /// Recipient address.
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form caller metadata. Keys serialize sorted.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl PaymentRequest {
    pub fn new(amount: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            recipient: recipient.into(),
            description: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The exact text the signer signs: a fixed prefix and the request as
    /// field-ordered JSON.
    pub fn canonical_message(&self) -> Result<String, PaymentError> {
        let json = serde_json::to_string(self)
            .map_err(|e| PaymentError::PaymentFailed(format!("cannot encode request: {e}")))?;
        Ok(format!("Payment request: {json}"))
    }

    /// Check the amount against the policy minimum and the recipient format.
    pub fn validate(&self, policy: &PolicyConfig) -> Result<(Amount, Address), PaymentError> {
        let amount = Amount::parse(&self.amount)?;
        if amount.value() < policy.min_amount {
            return Err(PaymentError::InvalidRequest(format!(
                "amount too small, minimum payment is {} USDC",
                policy.min_amount.normalize()
            )));
        }
        let recipient = parse_address(&self.recipient)
            .map_err(|e| PaymentError::InvalidRequest(e.to_string()))?;
        Ok((amount, recipient))
    }
}

/// Authentication attached to an initiate call. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub address: Address,
    /// `0x`-prefixed hex signature.
    pub signature: String,
    pub chain_id: ChainId,
}

/// On-chain status as reported by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    #[default]
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        }
    }
}

/// Decoded `GET status/{hash}` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub transaction_hash: TransactionHandle,
    pub status: TxStatus,
    #[serde(default)]
    pub confirmations: u32,
    #[serde(default)]
    pub required_confirmations: u32,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub recipient: String,
    pub timestamp: DateTime<Utc>,
    pub block_number: Option<u64>,
    pub gas_used: Option<String>,
    pub gas_fee: Option<String>,
}

impl StatusReport {
    pub fn new(
        transaction_hash: TransactionHandle,
        status: TxStatus,
        confirmations: u32,
        required_confirmations: u32,
    ) -> Self {
        Self {
            transaction_hash,
            status,
            confirmations,
            required_confirmations,
            amount: String::new(),
            recipient: String::new(),
            timestamp: Utc::now(),
            block_number: None,
            gas_used: None,
            gas_fee: None,
        }
    }

    /// Confirmed, or pending with enough confirmations to count as final.
    pub fn is_final(&self) -> bool {
        match self.status {
            TxStatus::Confirmed => true,
            TxStatus::Pending => {
                self.required_confirmations > 0
                    && self.confirmations >= self.required_confirmations
            }
            TxStatus::Failed => false,
        }
    }
}

/// The mutable unit the coordinator owns for one payment.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentAttempt {
    pub id: AttemptId,
    pub request: PaymentRequest,
    pub transaction_handle: Option<TransactionHandle>,
    pub state: PaymentState,
    pub confirmations: u32,
    /// Threshold as last reported by the endpoint.
    pub required_confirmations: Option<u32>,
    pub last_error: Option<PaymentError>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentAttempt {
    pub fn new(id: AttemptId, request: PaymentRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            request,
            transaction_handle: None,
            state: PaymentState::Submitting,
            confirmations: 0,
            required_confirmations: None,
            last_error: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn outcome(&self) -> PaymentOutcome {
        PaymentOutcome {
            transaction_handle: self.transaction_handle.clone(),
            state: self.state,
            amount: self.request.amount.clone(),
            recipient: self.request.recipient.clone(),
            timestamp: self.updated_at,
        }
    }
}

/// Immutable snapshot handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub transaction_handle: Option<TransactionHandle>,
    pub state: PaymentState,
    pub amount: String,
    pub recipient: String,
    pub timestamp: DateTime<Utc>,
}

/// Body of `POST initiate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub amount: String,
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub chain_id: u64,
    pub token_address: String,
    pub wallet_address: String,
}

/// `200` body of `POST initiate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub transaction_hash: TransactionHandle,
    pub status: TxStatus,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub chain_id: u64,
    #[serde(default)]
    pub token_address: String,
    #[serde(default)]
    pub wallet_address: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_confirmation_time: Option<String>,
}

/// `402` body of `POST initiate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredBody {
    pub error: String,
    pub code: String,
    pub payment_url: String,
    pub amount: String,
}

/// Body of every non-402 error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
