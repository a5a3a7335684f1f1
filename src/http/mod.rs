//! Reference payment endpoint.
//!
//! # Data Flow
//! ```text
//! POST /payments/initiate
//!     → handlers.rs (validate, auth headers, escalate or accept)
//!     → ledger (hash → amount, recipient)
//! GET /payments/status/{hash}
//!     → oracle.rs (pending / confirmed / failed)
//!     → handlers.rs (status report)
//! OPTIONS on both
//!     → cors.rs
//! ```

pub mod cors;
pub mod handlers;
pub mod oracle;
pub mod server;

pub use oracle::{DigestOracle, Observation, ScriptedOracle, StatusOracle};
pub use server::{GatewayServer, GatewayState};
