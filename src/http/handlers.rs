//! Gateway request handlers.
//!
//! # Initiate checks, in order
//! 1. `amount`, `recipient`, `walletAddress` present (400)
//! 2. chain support (400), including a `chainId` that is not a number
//! 3. field types: `amount` a string or number, the others strings (400)
//! 4. wallet headers present and matching `walletAddress` (401)
//! 5. simulated processing delay
//! 6. amount parses (400)
//! 7. above the escalation threshold (402)
//! 8. below the minimum (400)
//! 9. accepted: pending handle (200)
//!
//! Only a body that is not a JSON object is a 500.

use std::time::{Duration, Instant};

use alloy::primitives::hex;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blockchain::types::is_tx_hash;
use crate::http::cors::allow_any_origin;
use crate::http::server::GatewayState;
use crate::observability::metrics;
use crate::payments::types::{
    Amount, ErrorBody, InitiateResponse, PaymentRequiredBody, StatusReport, TransactionHandle,
    TxStatus, HEADER_WALLET_ADDRESS, HEADER_WALLET_SIGNATURE,
};

/// Reported for hashes the gateway never minted.
const UNKNOWN_AMOUNT: &str = "10.00";
const UNKNOWN_RECIPIENT: &str = "0x742d35Cc6634C0532925a3b8D4C9db96590c6C8B";

/// What the gateway remembers about an accepted payment.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub amount: String,
    pub recipient: String,
    pub wallet_address: String,
    pub created_at: DateTime<Utc>,
}

/// Lenient view of the initiate body; field types are checked one by one.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitiateBody {
    amount: Option<Value>,
    recipient: Option<Value>,
    description: Option<Value>,
    chain_id: Option<Value>,
    token_address: Option<Value>,
    wallet_address: Option<Value>,
}

/// How a required text field showed up in the body.
#[derive(Debug, PartialEq)]
enum Field {
    Missing,
    Text(String),
    Mistyped,
}

impl Field {
    /// Strings are taken as-is; numbers when `numeric` is set. Null, absent
    /// and blank values count as missing.
    fn classify(value: Option<Value>, numeric: bool) -> Self {
        match value {
            None | Some(Value::Null) => Field::Missing,
            Some(Value::String(s)) if s.trim().is_empty() => Field::Missing,
            Some(Value::String(s)) => Field::Text(s),
            Some(Value::Number(n)) if numeric => Field::Text(n.to_string()),
            Some(_) => Field::Mistyped,
        }
    }
}

fn optional_text(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    payments: usize,
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    allow_any_origin(
        (
            status,
            Json(ErrorBody {
                error: message.into(),
            }),
        )
            .into_response(),
    )
}

fn random_tx_hash() -> TransactionHandle {
    let bytes: [u8; 32] = rand::random();
    TransactionHandle::new(hex::encode_prefixed(bytes))
}

/// `POST /payments/initiate`
pub async fn initiate(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let response = handle_initiate(&state, &headers, &body).await;
    metrics::record_gateway_request("initiate", response.status().as_u16(), start);
    response
}

async fn handle_initiate(state: &GatewayState, headers: &HeaderMap, body: &[u8]) -> Response {
    let body: InitiateBody = match serde_json::from_slice(body) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "Payment initiation error");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    let amount = Field::classify(body.amount, true);
    let recipient = Field::classify(body.recipient, false);
    let wallet_address = Field::classify(body.wallet_address, false);
    if [&amount, &recipient, &wallet_address].contains(&&Field::Missing) {
        return json_error(
            StatusCode::BAD_REQUEST,
            "Missing required fields: amount, recipient, walletAddress",
        );
    }

    let chain = &state.config.chain;
    let chain_id = match body.chain_id.as_ref().and_then(Value::as_u64) {
        Some(id) if id == chain.chain_id => id,
        _ => {
            let requested = match &body.chain_id {
                None | Some(Value::Null) => "none".to_string(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            return json_error(
                StatusCode::BAD_REQUEST,
                format!(
                    "Unsupported chain ID: {}. Only {} ({}) is supported.",
                    requested, chain.name, chain.chain_id
                ),
            );
        }
    };

    let amount = match amount {
        Field::Text(amount) => amount,
        _ => return json_error(StatusCode::BAD_REQUEST, "Invalid amount"),
    };
    let recipient = match recipient {
        Field::Text(recipient) => recipient,
        _ => return json_error(StatusCode::BAD_REQUEST, "Invalid recipient"),
    };
    let wallet_address = match wallet_address {
        Field::Text(wallet_address) => wallet_address,
        _ => return json_error(StatusCode::BAD_REQUEST, "Invalid walletAddress"),
    };
    let token_address =
        optional_text(body.token_address).unwrap_or_else(|| chain.token_address.clone());

    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let (Some(header_address), Some(_signature)) = (
        header_str(HEADER_WALLET_ADDRESS),
        header_str(HEADER_WALLET_SIGNATURE),
    ) else {
        return json_error(StatusCode::UNAUTHORIZED, "Missing wallet authentication headers");
    };
    if !header_address.eq_ignore_ascii_case(&wallet_address) {
        tracing::warn!(header = %header_address, body = %wallet_address, "Wallet address mismatch");
        return json_error(StatusCode::UNAUTHORIZED, "Wallet address mismatch");
    }

    let gateway = &state.config.gateway;
    if gateway.processing_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(gateway.processing_delay_ms)).await;
    }

    let value: Decimal = match amount.trim().parse() {
        Ok(value) => value,
        Err(_) => return json_error(StatusCode::BAD_REQUEST, "Invalid amount"),
    };

    let policy = &state.config.policy;
    if value > policy.escalation_threshold {
        let fee = match Amount::new(value) {
            Ok(amount) => amount.scaled(policy.escalation_fee_rate),
            Err(_) => return json_error(StatusCode::BAD_REQUEST, "Invalid amount"),
        };
        tracing::info!(amount = %value, fee = %fee, "Escalating payment");

        let mut response = (
            StatusCode::PAYMENT_REQUIRED,
            Json(PaymentRequiredBody {
                error: "Payment required".to_string(),
                code: "PAYMENT_REQUIRED".to_string(),
                payment_url: gateway.payment_url.clone(),
                amount: fee.to_string(),
            }),
        )
            .into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("x402-payment-required"),
        );
        return allow_any_origin(response);
    }

    if value < policy.min_amount {
        return json_error(
            StatusCode::BAD_REQUEST,
            format!(
                "Amount too small. Minimum payment is ${} USDC",
                policy.min_amount.normalize()
            ),
        );
    }

    let transaction_hash = random_tx_hash();
    let now = Utc::now();
    state.ledger.insert(
        transaction_hash.as_str().to_lowercase(),
        LedgerEntry {
            amount: amount.clone(),
            recipient: recipient.clone(),
            wallet_address: wallet_address.clone(),
            created_at: now,
        },
    );

    tracing::info!(
        tx_hash = %transaction_hash,
        amount = %amount,
        recipient = %recipient,
        wallet = %wallet_address,
        "Payment initiated"
    );

    allow_any_origin(
        Json(InitiateResponse {
            transaction_hash,
            status: TxStatus::Pending,
            amount,
            recipient,
            description: optional_text(body.description),
            chain_id,
            token_address,
            wallet_address,
            timestamp: Some(now),
            estimated_confirmation_time: Some(gateway.estimated_confirmation_time.clone()),
        })
        .into_response(),
    )
}

/// `GET /payments/status/{hash}`
pub async fn status(State(state): State<GatewayState>, Path(hash): Path<String>) -> Response {
    let start = Instant::now();
    let response = handle_status(&state, hash).await;
    metrics::record_gateway_request("status", response.status().as_u16(), start);
    response
}

async fn handle_status(state: &GatewayState, hash: String) -> Response {
    if !is_tx_hash(&hash) {
        return json_error(StatusCode::BAD_REQUEST, "Invalid transaction hash");
    }

    let handle = TransactionHandle::new(hash);
    let required = state.config.policy.required_confirmations;
    let observation = state.oracle.observe(&handle, required).await;

    let (amount, recipient) = match state.ledger.get(&handle.as_str().to_lowercase()) {
        Some(entry) => (entry.amount.clone(), entry.recipient.clone()),
        None => (UNKNOWN_AMOUNT.to_string(), UNKNOWN_RECIPIENT.to_string()),
    };

    tracing::debug!(
        tx_hash = %handle,
        status = observation.status.as_str(),
        confirmations = observation.confirmations,
        "Status queried"
    );

    let mut report = StatusReport::new(handle, observation.status, observation.confirmations, required);
    report.amount = amount;
    report.recipient = recipient;
    report.block_number = observation.block_number;
    report.gas_used = observation.gas_used;
    report.gas_fee = observation.gas_fee;

    allow_any_origin(Json(report).into_response())
}

/// `GET /health`
pub async fn health(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(HealthBody {
        status: "ok",
        payments: state.ledger.len(),
    })
}
