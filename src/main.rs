//! x402 reference payment gateway.
//!
//! Serves the initiate/status contract the payment coordinator talks to.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────┐
//!                  │                x402 GATEWAY                   │
//!                  │                                               │
//!   Coordinator    │  ┌──────────┐    ┌──────────┐                 │
//!   ───────────────┼─▶│  axum    │───▶│ handlers │──▶ ledger       │
//!   POST initiate  │  │  router  │    │          │   (in memory)   │
//!   GET status     │  └──────────┘    └────┬─────┘                 │
//!                  │                       │                       │
//!                  │                       ▼                       │
//!                  │                 ┌───────────┐                 │
//!                  │                 │  status   │                 │
//!                  │                 │  oracle   │                 │
//!                  │                 └───────────┘                 │
//!                  │                                               │
//!                  │  config · observability · lifecycle           │
//!                  └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use x402_pay::config::load_or_default;
use x402_pay::http::{DigestOracle, GatewayServer};
use x402_pay::lifecycle::{wait_for_shutdown_signal, Shutdown};
use x402_pay::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "x402-gateway")]
#[command(about = "Reference x402 payment endpoint", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `gateway.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut config = load_or_default(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.gateway.bind_address = bind;
    }

    logging::init(&config.observability.log_level);
    tracing::info!("x402-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.gateway.bind_address,
        chain = %config.chain.name,
        min_amount = %config.policy.min_amount,
        escalation_threshold = %config.policy.escalation_threshold,
        required_confirmations = config.policy.required_confirmations,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.gateway.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config, Arc::new(DigestOracle));
    let serve = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_shutdown_signal().await;
    shutdown.trigger();
    serve.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
