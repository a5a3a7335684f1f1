//! CORS preflight responses.

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

const INITIATE_METHODS: &str = "POST, OPTIONS";
const INITIATE_HEADERS: &str = "Content-Type, X-Wallet-Address, X-Wallet-Signature, X-Chain-Id";
const STATUS_METHODS: &str = "GET, OPTIONS";
const STATUS_HEADERS: &str = "Content-Type";

fn preflight(methods: &'static str, headers: &'static str) -> Response {
    let pairs: [(HeaderName, HeaderValue); 3] = [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
        (header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(methods)),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(headers)),
    ];
    (StatusCode::OK, pairs).into_response()
}

pub async fn initiate_preflight() -> Response {
    preflight(INITIATE_METHODS, INITIATE_HEADERS)
}

pub async fn status_preflight() -> Response {
    preflight(STATUS_METHODS, STATUS_HEADERS)
}

/// Attach `Access-Control-Allow-Origin: *` to a regular response.
pub fn allow_any_origin(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}
