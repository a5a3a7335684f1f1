//! Payment coordination.
//!
//! # Data Flow
//! ```text
//! PaymentRequest
//!     → coordinator.rs (validate, single in-flight attempt)
//!     → transport.rs (sign via signer.rs, POST initiate)
//!     → scheduler.rs (delayed status polls)
//!     → transport.rs (GET status/{hash}, bounded retries)
//!     → coordinator.rs (Success / Failed)
//! ```

pub mod coordinator;
pub mod error;
pub mod scheduler;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;
pub mod signer;
pub mod transport;
pub mod types;

pub use coordinator::{CoordinatorState, PaymentCoordinator};
pub use error::PaymentError;
#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedTransport;
pub use signer::{SharedSigner, SignerAdapter, SignerError};
pub use transport::{HttpTransport, PaymentTransport};
pub use types::{
    Amount, AttemptId, PaymentAttempt, PaymentOutcome, PaymentRequest, PaymentState,
    StatusReport, TransactionHandle, TxStatus,
};
