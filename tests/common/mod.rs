//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use x402_pay::blockchain::Wallet;
use x402_pay::config::PayConfig;
use x402_pay::http::{GatewayServer, StatusOracle};
use x402_pay::lifecycle::Shutdown;
use x402_pay::payments::{HttpTransport, SharedSigner};

/// Anvil's first account.
pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub const RECIPIENT: &str = "0x742d35Cc6634C0532925a3b8D4C9db96590c6C8B";

/// A gateway running on an ephemeral port. Stops when dropped.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub config: PayConfig,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn base_url(&self) -> String {
        format!("http://{}/payments", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Defaults with fast polling and no simulated processing delay.
pub fn test_config() -> PayConfig {
    let mut config = PayConfig::default();
    config.gateway.processing_delay_ms = 0;
    config.polling.initial_delay_ms = 20;
    config.polling.interval_ms = 20;
    config.polling.max_duration_secs = 5;
    config.polling.status_retry.base_delay_ms = 10;
    config.polling.status_retry.max_delay_ms = 50;
    config
}

/// Start the gateway with `oracle` and return once it is accepting.
pub async fn start_gateway(oracle: Arc<dyn StatusOracle>) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = test_config();
    config.gateway.bind_address = addr.to_string();
    config.endpoint.base_url = format!("http://{}/payments", addr);

    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config.clone(), oracle);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestGateway {
        addr,
        config,
        shutdown,
    }
}

pub fn test_wallet(chain_id: u64) -> Wallet {
    Wallet::from_private_key(TEST_PRIVATE_KEY, chain_id).unwrap()
}

/// HTTP transport pointed at `gateway` with the test wallet bound.
pub fn signed_transport(gateway: &TestGateway) -> Arc<HttpTransport> {
    let transport = HttpTransport::new(&gateway.config).unwrap();
    let wallet = test_wallet(gateway.config.chain.chain_id);
    transport.bind_signer(Arc::new(SharedSigner::new(Arc::new(wallet))));
    Arc::new(transport)
}
