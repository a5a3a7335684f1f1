//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PayConfig (validated, immutable)
//!     → cloned into the transport, coordinator and gateway
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Policy values (minimum, escalation fee, confirmation threshold) live here,
//!   never as constants in the payment code

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    ChainConfig, EndpointConfig, GatewayConfig, ObservabilityConfig, PayConfig, PolicyConfig,
    PollingConfig, RetryConfig,
};
