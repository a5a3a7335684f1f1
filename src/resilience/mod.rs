//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Status check against the payment endpoint:
//!     → retries.rs (retry transient failures up to a bounded count)
//!     → backoff.rs (exponential delay with jitter between tries)
//! ```
//!
//! # Design Decisions
//! - Submissions are never retried: a second initiate could create a second payment
//! - Status checks are idempotent reads and may be retried

pub mod backoff;
pub mod retries;

pub use backoff::calculate_backoff;
pub use retries::{retry_with_backoff, RetryPolicy};
