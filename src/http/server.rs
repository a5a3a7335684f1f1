//! Reference payment gateway.
//!
//! # Responsibilities
//! - Create the Axum router for the initiate/status contract
//! - Wire up middleware (tracing, timeout, request ID)
//! - Hold the in-memory payment ledger and the status oracle
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::routing::post;
use axum::Router;
use dashmap::DashMap;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::PayConfig;
use crate::http::cors;
use crate::http::handlers::{self, LedgerEntry};
use crate::http::oracle::StatusOracle;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<PayConfig>,
    pub oracle: Arc<dyn StatusOracle>,
    /// Accepted payments keyed by lowercase hash. Lost on restart.
    pub ledger: Arc<DashMap<String, LedgerEntry>>,
}

/// HTTP server for the payment endpoint.
pub struct GatewayServer {
    router: Router,
    state: GatewayState,
}

impl GatewayServer {
    pub fn new(config: PayConfig, oracle: Arc<dyn StatusOracle>) -> Self {
        let state = GatewayState {
            config: Arc::new(config),
            oracle,
            ledger: Arc::new(DashMap::new()),
        };
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: GatewayState) -> Router {
        let timeout = Duration::from_secs(state.config.gateway.request_timeout_secs);

        Router::new()
            .route(
                "/payments/initiate",
                post(handlers::initiate).options(cors::initiate_preflight),
            )
            .route(
                "/payments/status/{hash}",
                get(handlers::status).options(cors::status_preflight),
            )
            .route("/health", get(handlers::health))
            .with_state(state)
            .layer(TimeoutLayer::new(timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            chain_id = self.state.config.chain.chain_id,
            "Payment gateway starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("Payment gateway stopped");
        Ok(())
    }
}
