//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and formats.
//! Every problem is reported, not just the first one.

use std::fmt;

use rust_decimal::Decimal;

use crate::config::schema::PayConfig;

/// Largest scale `rust_decimal` can represent.
pub const MAX_TOKEN_DECIMALS: u32 = 28;

/// Longest poll window accepted from configuration (one week).
pub const MAX_POLL_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &PayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if url::Url::parse(&config.endpoint.base_url).is_err() {
        errors.push(ValidationError::new(
            "endpoint.base_url",
            format!("'{}' is not a valid URL", config.endpoint.base_url),
        ));
    }
    if config.endpoint.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "endpoint.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    if config
        .chain
        .token_address
        .parse::<alloy::primitives::Address>()
        .is_err()
    {
        errors.push(ValidationError::new(
            "chain.token_address",
            "must be a 20-byte hex address",
        ));
    }

    if config.chain.token_decimals > MAX_TOKEN_DECIMALS {
        errors.push(ValidationError::new(
            "chain.token_decimals",
            format!("must not exceed {}", MAX_TOKEN_DECIMALS),
        ));
    }
    if url::Url::parse(&config.chain.rpc_url).is_err() {
        errors.push(ValidationError::new(
            "chain.rpc_url",
            format!("'{}' is not a valid URL", config.chain.rpc_url),
        ));
    }

    let policy = &config.policy;
    if policy.min_amount <= Decimal::ZERO {
        errors.push(ValidationError::new("policy.min_amount", "must be positive"));
    }
    if policy.escalation_threshold < policy.min_amount {
        errors.push(ValidationError::new(
            "policy.escalation_threshold",
            "must not be below policy.min_amount",
        ));
    }
    if policy.escalation_fee_rate < Decimal::ZERO || policy.escalation_fee_rate > Decimal::ONE {
        errors.push(ValidationError::new(
            "policy.escalation_fee_rate",
            "must be between 0 and 1",
        ));
    }
    if policy.fallback_balance < Decimal::ZERO {
        errors.push(ValidationError::new(
            "policy.fallback_balance",
            "must not be negative",
        ));
    }
    if policy.required_confirmations == 0 {
        errors.push(ValidationError::new(
            "policy.required_confirmations",
            "must be at least 1",
        ));
    }

    let polling = &config.polling;
    if polling.interval_ms == 0 {
        errors.push(ValidationError::new(
            "polling.interval_ms",
            "must be greater than zero",
        ));
    }
    if polling.max_duration_secs == 0 {
        errors.push(ValidationError::new(
            "polling.max_duration_secs",
            "must be greater than zero",
        ));
    } else if polling.max_duration_secs > MAX_POLL_WINDOW_SECS {
        errors.push(ValidationError::new(
            "polling.max_duration_secs",
            format!("must not exceed {} seconds", MAX_POLL_WINDOW_SECS),
        ));
    }
    if polling.status_retry.max_attempts == 0 {
        errors.push(ValidationError::new(
            "polling.status_retry.max_attempts",
            "must be at least 1",
        ));
    }
    if polling.status_retry.base_delay_ms > polling.status_retry.max_delay_ms {
        errors.push(ValidationError::new(
            "polling.status_retry.base_delay_ms",
            "must not exceed max_delay_ms",
        ));
    }

    if config
        .gateway
        .bind_address
        .parse::<std::net::SocketAddr>()
        .is_err()
    {
        errors.push(ValidationError::new(
            "gateway.bind_address",
            format!("'{}' is not a socket address", config.gateway.bind_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
