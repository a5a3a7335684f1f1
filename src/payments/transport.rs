//! Payment transport.
//!
//! # Responsibilities
//! - Turn a `PaymentRequest` into a signed `POST initiate` call
//! - Turn a transaction handle into a `GET status/{hash}` call
//! - Classify every failure into the `PaymentError` taxonomy
//! - Read the signer's token balance for display
//!
//! # Design Decisions
//! - No retries here; retry policy belongs to the coordinator
//! - No caching of handles
//! - The signer is swapped atomically on wallet connect/disconnect

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{hex, Address};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::blockchain::types::{from_base_units, ChainId};
use crate::config::PayConfig;
use crate::payments::error::PaymentError;
use crate::payments::signer::SharedSigner;
use crate::payments::types::{
    AuthHeaders, ErrorBody, InitiateRequest, InitiateResponse, PaymentRequest,
    PaymentRequiredBody, StatusReport, TransactionHandle, HEADER_CHAIN_ID,
    HEADER_WALLET_ADDRESS, HEADER_WALLET_SIGNATURE,
};

/// What the coordinator needs from the network.
#[async_trait]
pub trait PaymentTransport: Send + Sync {
    /// Sign and submit `request`, returning the pending transaction handle.
    async fn submit(&self, request: &PaymentRequest) -> Result<TransactionHandle, PaymentError>;

    /// Query the current status of `handle`. Never retries.
    async fn status(&self, handle: &TransactionHandle) -> Result<StatusReport, PaymentError>;
}

/// `PaymentTransport` over HTTP.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    chain_id: ChainId,
    token_address: String,
    token_decimals: u32,
    fallback_fee: Decimal,
    fallback_balance: Decimal,
    signer: ArcSwapOption<SharedSigner>,
}

impl HttpTransport {
    /// Build a transport for the endpoint and chain in `config`. No signer is bound.
    pub fn new(config: &PayConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.endpoint.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.endpoint.base_url.trim_end_matches('/').to_string(),
            chain_id: ChainId(config.chain.chain_id),
            token_address: config.chain.token_address.clone(),
            token_decimals: config.chain.token_decimals,
            fallback_fee: config.policy.fallback_fee,
            fallback_balance: config.policy.fallback_balance,
            signer: ArcSwapOption::empty(),
        })
    }

    /// Bind (or replace) the signer used for authentication.
    pub fn bind_signer(&self, signer: Arc<SharedSigner>) {
        tracing::info!(address = %signer.address(), "Signer bound");
        self.signer.store(Some(signer));
    }

    /// Drop the bound signer; subsequent submits fail with `WalletNotConnected`.
    pub fn unbind_signer(&self) {
        if self.signer.swap(None).is_some() {
            tracing::info!("Signer unbound");
        }
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.signer.load().as_ref().map(|s| s.address())
    }

    /// Network fee estimate from the bound signer, or the configured fallback
    /// when the signer cannot estimate.
    pub async fn estimate_fee(&self, request: &PaymentRequest) -> Result<Decimal, PaymentError> {
        let signer = self.signer.load_full().ok_or(PaymentError::WalletNotConnected)?;
        match signer.estimate_fee(request).await {
            Ok(fee) => Ok(fee),
            Err(e) => {
                tracing::warn!(error = %e, fallback = %self.fallback_fee, "Fee estimation failed");
                Ok(self.fallback_fee)
            }
        }
    }

    /// Token balance of the bound signer, rounded to cents. A failed read
    /// reports the configured fallback balance.
    pub async fn usdc_balance(&self) -> Result<Decimal, PaymentError> {
        let signer = self.signer.load_full().ok_or(PaymentError::WalletNotConnected)?;

        let read = match self.token_address.parse::<Address>() {
            Ok(token) => signer.token_balance(token).await.map_err(|e| e.to_string()),
            Err(e) => Err(format!("invalid token address: {e}")),
        };
        let balance = read.and_then(|raw| {
            from_base_units(raw, self.token_decimals)
                .ok_or_else(|| format!("balance {raw} out of range"))
        });

        match balance {
            Ok(balance) => Ok(cents(balance)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    address = %signer.address(),
                    fallback = %self.fallback_balance,
                    "Balance read failed"
                );
                Ok(cents(self.fallback_balance))
            }
        }
    }

    /// Sign the canonical form of `request` with the bound signer.
    pub async fn auth_headers(&self, request: &PaymentRequest) -> Result<AuthHeaders, PaymentError> {
        let signer = self.signer.load_full().ok_or(PaymentError::WalletNotConnected)?;
        let message = request.canonical_message()?;
        let signature = signer.sign(message.as_bytes()).await?;

        Ok(AuthHeaders {
            address: signer.address(),
            signature: hex::encode_prefixed(signature.as_bytes()),
            chain_id: self.chain_id,
        })
    }

    fn initiate_url(&self) -> String {
        format!("{}/initiate", self.base_url)
    }

    fn status_url(&self, handle: &TransactionHandle) -> String {
        format!("{}/status/{}", self.base_url, handle)
    }
}

#[async_trait]
impl PaymentTransport for HttpTransport {
    async fn submit(&self, request: &PaymentRequest) -> Result<TransactionHandle, PaymentError> {
        let auth = self.auth_headers(request).await?;

        let body = InitiateRequest {
            amount: request.amount.clone(),
            recipient: request.recipient.clone(),
            description: request.description.clone(),
            chain_id: self.chain_id.0,
            token_address: self.token_address.clone(),
            wallet_address: auth.address.to_string(),
        };

        tracing::debug!(
            amount = %body.amount,
            recipient = %body.recipient,
            wallet = %auth.address,
            "Posting payment initiation"
        );

        let response = self
            .client
            .post(self.initiate_url())
            .header(HEADER_WALLET_ADDRESS, auth.address.to_string())
            .header(HEADER_WALLET_SIGNATURE, &auth.signature)
            .header(HEADER_CHAIN_ID, auth.chain_id.to_string())
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::PaymentFailed(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PaymentError::PaymentFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_initiate_failure(status, &text));
        }

        let accepted: InitiateResponse = serde_json::from_str(&text).map_err(|e| {
            PaymentError::PaymentFailed(format!("malformed initiate response: {e}"))
        })?;
        Ok(accepted.transaction_hash)
    }

    async fn status(&self, handle: &TransactionHandle) -> Result<StatusReport, PaymentError> {
        let response = self
            .client
            .get(self.status_url(handle))
            .send()
            .await
            .map_err(|e| PaymentError::StatusCheckFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PaymentError::StatusCheckFailed(format!(
                "endpoint returned {}: {}",
                status,
                error_message(&text)
            )));
        }

        response
            .json::<StatusReport>()
            .await
            .map_err(|e| PaymentError::StatusCheckFailed(format!("malformed status response: {e}")))
    }
}

/// Map a non-success initiate response onto the error taxonomy.
pub fn classify_initiate_failure(status: StatusCode, body: &str) -> PaymentError {
    if status == StatusCode::PAYMENT_REQUIRED {
        return match serde_json::from_str::<PaymentRequiredBody>(body) {
            Ok(required) => PaymentError::PaymentRequired {
                amount: required.amount,
                payment_url: required.payment_url,
            },
            Err(e) => PaymentError::PaymentFailed(format!("malformed 402 response: {e}")),
        };
    }

    let message = error_message(body);
    if message.to_lowercase().contains("insufficient funds") {
        return PaymentError::InsufficientFunds;
    }

    match status {
        StatusCode::BAD_REQUEST => PaymentError::InvalidRequest(message),
        _ => PaymentError::PaymentFailed(format!("endpoint returned {}: {}", status, message)),
    }
}

/// `value` at exactly two decimal places, midpoints rounded away from zero.
fn cents(value: Decimal) -> Decimal {
    let mut cents = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    cents.rescale(2);
    cents
}

/// The `error` field of a JSON error body, or the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Wallet;
    use crate::payments::signer::{SignerAdapter, SignerError};
    use alloy::primitives::U256;
    use alloy::signers::Signature;
    use rust_decimal_macros::dec;

    /// Test wallet whose balance reads return a fixed result.
    struct FixedBalance {
        wallet: Wallet,
        balance: Result<U256, SignerError>,
    }

    #[async_trait]
    impl SignerAdapter for FixedBalance {
        fn address(&self) -> Address {
            self.wallet.address()
        }

        async fn sign(&self, message: &[u8]) -> Result<Signature, SignerError> {
            SignerAdapter::sign(&self.wallet, message).await
        }

        async fn estimate_fee(&self, request: &PaymentRequest) -> Result<Decimal, SignerError> {
            SignerAdapter::estimate_fee(&self.wallet, request).await
        }

        async fn token_balance(&self, _token: Address) -> Result<U256, SignerError> {
            self.balance.clone()
        }
    }

    fn transport_with_balance(
        config: &PayConfig,
        balance: Result<U256, SignerError>,
    ) -> HttpTransport {
        let transport = HttpTransport::new(config).unwrap();
        let signer = FixedBalance {
            wallet: crate::blockchain::wallet::tests::test_wallet(),
            balance,
        };
        transport.bind_signer(Arc::new(SharedSigner::new(Arc::new(signer))));
        transport
    }

    #[test]
    fn test_classify_payment_required() {
        let body = r#"{"error":"Payment required","code":"PAYMENT_REQUIRED","paymentUrl":"/payment-gateway","amount":"15"}"#;
        assert_eq!(
            classify_initiate_failure(StatusCode::PAYMENT_REQUIRED, body),
            PaymentError::PaymentRequired {
                amount: "15".into(),
                payment_url: "/payment-gateway".into()
            }
        );
    }

    #[test]
    fn test_classify_bad_request_and_auth() {
        let err = classify_initiate_failure(
            StatusCode::BAD_REQUEST,
            r#"{"error":"Amount too small. Minimum payment is $0.01 USDC"}"#,
        );
        assert_eq!(
            err,
            PaymentError::InvalidRequest("Amount too small. Minimum payment is $0.01 USDC".into())
        );

        let err = classify_initiate_failure(
            StatusCode::UNAUTHORIZED,
            r#"{"error":"Wallet address mismatch"}"#,
        );
        assert_eq!(err.code(), "PAYMENT_FAILED");
        assert!(err.to_string().contains("Wallet address mismatch"));
    }

    #[test]
    fn test_classify_insufficient_funds_and_raw_bodies() {
        let err = classify_initiate_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"execution reverted: insufficient funds"}"#,
        );
        assert_eq!(err, PaymentError::InsufficientFunds);

        let err = classify_initiate_failure(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(
            err,
            PaymentError::PaymentFailed("endpoint returned 502 Bad Gateway: upstream down".into())
        );
    }

    #[tokio::test]
    async fn test_submit_without_signer_fails_fast() {
        let transport = HttpTransport::new(&PayConfig::default()).unwrap();
        let request = PaymentRequest::new("10.50", "0x742d35Cc6634C0532925a3b8D4C9db96590c6C8B");

        assert_eq!(
            transport.submit(&request).await.unwrap_err(),
            PaymentError::WalletNotConnected
        );
        assert_eq!(
            transport.estimate_fee(&request).await.unwrap_err(),
            PaymentError::WalletNotConnected
        );
        assert_eq!(
            transport.usdc_balance().await.unwrap_err(),
            PaymentError::WalletNotConnected
        );
    }

    #[tokio::test]
    async fn test_usdc_balance_scales_to_cents() {
        let config = PayConfig::default();
        for (raw, expected) in [
            (12_345_678u64, "12.35"),
            (5_000, "0.01"),
            (4_999, "0.00"),
            (0, "0.00"),
            (1_000_000_000, "1000.00"),
        ] {
            let transport = transport_with_balance(&config, Ok(U256::from(raw)));
            assert_eq!(transport.usdc_balance().await.unwrap().to_string(), expected);
        }
    }

    #[tokio::test]
    async fn test_usdc_balance_falls_back_when_read_fails() {
        let mut config = PayConfig::default();
        let transport =
            transport_with_balance(&config, Err(SignerError::Other("rpc unavailable".into())));
        assert_eq!(transport.usdc_balance().await.unwrap().to_string(), "0.00");

        config.policy.fallback_balance = dec!(1.5);
        let transport = transport_with_balance(&config, Ok(U256::MAX));
        assert_eq!(transport.usdc_balance().await.unwrap().to_string(), "1.50");
    }

    #[tokio::test]
    async fn test_usdc_balance_without_rpc_endpoint_falls_back() {
        let transport = HttpTransport::new(&PayConfig::default()).unwrap();
        let wallet = crate::blockchain::wallet::tests::test_wallet();
        transport.bind_signer(Arc::new(SharedSigner::new(Arc::new(wallet))));

        assert_eq!(transport.usdc_balance().await.unwrap(), dec!(0.00));
    }

    #[tokio::test]
    async fn test_auth_headers_sign_canonical_message() {
        let transport = HttpTransport::new(&PayConfig::default()).unwrap();
        let wallet = crate::blockchain::wallet::tests::test_wallet();
        transport.bind_signer(Arc::new(SharedSigner::new(Arc::new(wallet.clone()))));

        let request = PaymentRequest::new("10.50", "0x742d35Cc6634C0532925a3b8D4C9db96590c6C8B");
        let auth = transport.auth_headers(&request).await.unwrap();

        assert_eq!(auth.address, wallet.address());
        assert_eq!(auth.chain_id, ChainId(8453));
        assert!(auth.signature.starts_with("0x"));
        assert_eq!(auth.signature.len(), 2 + 65 * 2);

        let signature: alloy::signers::Signature = auth.signature.parse().unwrap();
        let message = request.canonical_message().unwrap();
        assert_eq!(
            signature.recover_address_from_msg(message.as_bytes()).unwrap(),
            wallet.address()
        );

        transport.unbind_signer();
        assert!(transport.signer_address().is_none());
    }
}
