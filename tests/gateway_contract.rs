//! HTTP contract of the reference gateway.

mod common;

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{start_gateway, RECIPIENT};
use x402_pay::http::{DigestOracle, Observation, ScriptedOracle};

const WALLET: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

fn initiate_body(amount: &str) -> Value {
    json!({
        "amount": amount,
        "recipient": RECIPIENT,
        "description": "API access",
        "chainId": 8453,
        "tokenAddress": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        "walletAddress": WALLET,
    })
}

async fn post_initiate(url: &str, body: &Value, wallet_header: Option<&str>) -> reqwest::Response {
    let client = reqwest::Client::new();
    let mut request = client.post(url).json(body);
    if let Some(wallet) = wallet_header {
        request = request
            .header("X-Wallet-Address", wallet)
            .header("X-Wallet-Signature", "0xdeadbeef")
            .header("X-Chain-Id", "8453");
    }
    request.send().await.unwrap()
}

#[tokio::test]
async fn test_initiate_accepts_amount_in_range() {
    let gateway = start_gateway(Arc::new(DigestOracle)).await;

    let res = post_initiate(
        &gateway.url("/payments/initiate"),
        &initiate_body("10.50"),
        Some(&WALLET.to_lowercase()),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");

    let body: Value = res.json().await.unwrap();
    let hash = body["transactionHash"].as_str().unwrap();
    assert_eq!(hash.len(), 66);
    assert!(hash.starts_with("0x"));
    assert_eq!(body["status"], "pending");
    assert_eq!(body["amount"], "10.50");
    assert_eq!(body["chainId"], 8453);
    assert_eq!(body["estimatedConfirmationTime"], "2-5 minutes");
}

#[tokio::test]
async fn test_initiate_escalates_above_threshold() {
    let gateway = start_gateway(Arc::new(DigestOracle)).await;

    let res = post_initiate(
        &gateway.url("/payments/initiate"),
        &initiate_body("1500"),
        Some(WALLET),
    )
    .await;
    assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(res.headers()["www-authenticate"], "x402-payment-required");

    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "error": "Payment required",
            "code": "PAYMENT_REQUIRED",
            "paymentUrl": "/payment-gateway",
            "amount": "15",
        })
    );
}

#[tokio::test]
async fn test_initiate_validation_failures() {
    let gateway = start_gateway(Arc::new(DigestOracle)).await;
    let url = gateway.url("/payments/initiate");

    let res = post_initiate(&url, &initiate_body("0.001"), Some(WALLET)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Amount too small. Minimum payment is $0.01 USDC");

    let mut missing = initiate_body("5");
    missing.as_object_mut().unwrap().remove("recipient");
    let res = post_initiate(&url, &missing, Some(WALLET)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let mut other_chain = initiate_body("5");
    other_chain["chainId"] = json!(1);
    let res = post_initiate(&url, &other_chain, Some(WALLET)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Unsupported chain"));

    let res = post_initiate(&url, &initiate_body("abc"), Some(WALLET)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let mut chain_as_text = initiate_body("5");
    chain_as_text["chainId"] = json!("8453");
    let res = post_initiate(&url, &chain_as_text, Some(WALLET)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Unsupported chain ID: 8453. Only Base (8453) is supported."
    );

    for amount in [json!(true), json!({ "value": "5" }), json!(["5"])] {
        let mut mistyped = initiate_body("5");
        mistyped["amount"] = amount;
        let res = post_initiate(&url, &mistyped, Some(WALLET)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "Invalid amount");
    }

    let mut null_amount = initiate_body("5");
    null_amount["amount"] = Value::Null;
    let res = post_initiate(&url, &null_amount, Some(WALLET)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Missing required fields: amount, recipient, walletAddress");
}

#[tokio::test]
async fn test_initiate_accepts_numeric_amount() {
    let gateway = start_gateway(Arc::new(DigestOracle)).await;

    let mut numeric = initiate_body("5");
    numeric["amount"] = json!(5);
    let res = post_initiate(&gateway.url("/payments/initiate"), &numeric, Some(WALLET)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["amount"], "5");
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn test_initiate_amount_range_is_closed() {
    let gateway = start_gateway(Arc::new(DigestOracle)).await;
    let url = gateway.url("/payments/initiate");

    for amount in ["0.01", "1000", "1000.00"] {
        let res = post_initiate(&url, &initiate_body(amount), Some(WALLET)).await;
        assert_eq!(res.status(), StatusCode::OK, "amount {amount}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["amount"], amount);
    }

    let res = post_initiate(&url, &initiate_body("1000.01"), Some(WALLET)).await;
    assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["amount"], "10.0001");

    let res = post_initiate(&url, &initiate_body("0.0099"), Some(WALLET)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_initiate_requires_matching_wallet_headers() {
    let gateway = start_gateway(Arc::new(DigestOracle)).await;
    let url = gateway.url("/payments/initiate");

    let res = post_initiate(&url, &initiate_body("5"), None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = post_initiate(
        &url,
        &initiate_body("5"),
        Some("0x0000000000000000000000000000000000000001"),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Wallet address mismatch");
}

#[tokio::test]
async fn test_undecodable_body_is_internal_error() {
    let gateway = start_gateway(Arc::new(DigestOracle)).await;

    let res = reqwest::Client::new()
        .post(gateway.url("/payments/initiate"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_status_rejects_malformed_hash() {
    let gateway = start_gateway(Arc::new(DigestOracle)).await;

    let res = reqwest::get(gateway.url("/payments/status/0x1234")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Invalid transaction hash");
}

#[tokio::test]
async fn test_status_echoes_ledger_entry() {
    let oracle = Arc::new(ScriptedOracle::new());
    oracle.script_default([Observation::pending(3)]);
    let gateway = start_gateway(oracle).await;

    let res = post_initiate(
        &gateway.url("/payments/initiate"),
        &initiate_body("42.00"),
        Some(WALLET),
    )
    .await;
    let body: Value = res.json().await.unwrap();
    let hash = body["transactionHash"].as_str().unwrap().to_string();

    let res = reqwest::get(gateway.url(&format!("/payments/status/{hash}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["transactionHash"], hash.as_str());
    assert_eq!(body["status"], "pending");
    assert_eq!(body["confirmations"], 3);
    assert_eq!(body["requiredConfirmations"], 12);
    assert_eq!(body["amount"], "42.00");
    assert_eq!(body["recipient"], RECIPIENT);
    assert!(body["blockNumber"].is_null());
    assert!(body["gasFee"].is_null());
}

#[tokio::test]
async fn test_status_for_unknown_hash_uses_placeholder_payment() {
    let gateway = start_gateway(Arc::new(DigestOracle)).await;
    // 0x0032 → confirmed
    let hash = format!("0x{:0>64}", "0032");

    let body: Value = reqwest::get(gateway.url(&format!("/payments/status/{hash}")))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["confirmations"], 12);
    assert_eq!(body["amount"], "10.00");
    assert_eq!(body["gasUsed"], "21000");
}

#[tokio::test]
async fn test_cors_preflight() {
    let gateway = start_gateway(Arc::new(DigestOracle)).await;
    let client = reqwest::Client::new();

    let res = client
        .request(reqwest::Method::OPTIONS, gateway.url("/payments/initiate"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(res.headers()["access-control-allow-methods"], "POST, OPTIONS");
    assert_eq!(
        res.headers()["access-control-allow-headers"],
        "Content-Type, X-Wallet-Address, X-Wallet-Signature, X-Chain-Id"
    );

    let res = client
        .request(
            reqwest::Method::OPTIONS,
            gateway.url(&format!("/payments/status/0x{:0>64}", "1")),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["access-control-allow-methods"], "GET, OPTIONS");
    assert_eq!(res.headers()["access-control-allow-headers"], "Content-Type");
}

#[tokio::test]
async fn test_health_counts_payments() {
    let gateway = start_gateway(Arc::new(DigestOracle)).await;
    post_initiate(&gateway.url("/payments/initiate"), &initiate_body("1"), Some(WALLET)).await;

    let body: Value = reqwest::get(gateway.url("/health")).await.unwrap().json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok", "payments": 1 }));
}
