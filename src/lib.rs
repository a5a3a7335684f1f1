//! x402 stablecoin payment coordination library.

pub mod blockchain;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod payments;
pub mod resilience;

pub use config::schema::PayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use payments::{HttpTransport, PaymentCoordinator, PaymentError, PaymentRequest, PaymentState};
