//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the payment
//! client and the reference gateway. All types derive Serde traits for
//! deserialization from config files.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PayConfig {
    /// Where the payment endpoint lives and how long calls may take.
    pub endpoint: EndpointConfig,

    /// Chain and token the payments settle on.
    pub chain: ChainConfig,

    /// Product policy values (minimums, escalation, confirmations).
    pub policy: PolicyConfig,

    /// Confirmation polling schedule.
    pub polling: PollingConfig,

    /// Reference gateway settings.
    pub gateway: GatewayConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Remote payment endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL; `initiate` and `status/{hash}` are appended to it.
    pub base_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000/payments".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Settlement chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Chain ID (8453 for Base mainnet).
    pub chain_id: u64,

    /// Human readable chain name used in error messages.
    pub name: String,

    /// Stablecoin contract address.
    pub token_address: String,

    /// Decimals of the stablecoin's base unit.
    pub token_decimals: u32,

    /// JSON-RPC endpoint used for balance reads.
    pub rpc_url: String,

    /// Block explorer base URL.
    pub explorer_url: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 8453,
            name: "Base".to_string(),
            // USDC on Base
            token_address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            token_decimals: 6,
            rpc_url: "https://mainnet.base.org".to_string(),
            explorer_url: "https://basescan.org".to_string(),
        }
    }
}

/// Product policy. None of these are protocol requirements.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Smallest accepted payment amount.
    pub min_amount: Decimal,

    /// Amounts strictly above this escalate with 402 Payment Required.
    pub escalation_threshold: Decimal,

    /// Fraction of the amount demanded as the follow-up payment on escalation.
    pub escalation_fee_rate: Decimal,

    /// Confirmations after which a transaction counts as final.
    pub required_confirmations: u32,

    /// Fee reported when the signer cannot estimate one.
    pub fallback_fee: Decimal,

    /// Balance reported when the token balance cannot be read.
    pub fallback_balance: Decimal,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_amount: Decimal::new(1, 2),
            escalation_threshold: Decimal::new(1000, 0),
            escalation_fee_rate: Decimal::new(1, 2),
            required_confirmations: 12,
            fallback_fee: Decimal::new(1, 3),
            fallback_balance: Decimal::new(0, 2),
        }
    }
}

/// Confirmation polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay before the first status poll, in milliseconds.
    pub initial_delay_ms: u64,

    /// Delay between status polls while pending, in milliseconds.
    pub interval_ms: u64,

    /// Give up waiting for confirmation after this many seconds.
    pub max_duration_secs: u64,

    /// Retry policy for failed status checks.
    pub status_retry: RetryConfig,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2000,
            interval_ms: 3000,
            max_duration_secs: 600,
            status_retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of tries, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

/// Reference gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address (e.g., "127.0.0.1:3000").
    pub bind_address: String,

    /// Artificial processing time for initiate calls, in milliseconds.
    pub processing_delay_ms: u64,

    /// Where escalated payers are sent to settle the follow-up payment.
    pub payment_url: String,

    /// Free-form estimate echoed in initiate responses.
    pub estimated_confirmation_time: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            processing_delay_ms: 1000,
            payment_url: "/payment-gateway".to_string(),
            estimated_confirmation_time: "2-5 minutes".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
