use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use x402_pay::blockchain::types::is_tx_hash;
use x402_pay::blockchain::{BlockchainError, Wallet};
use x402_pay::config::{load_or_default, PayConfig};
use x402_pay::observability::logging;
use x402_pay::payments::{
    HttpTransport, PaymentCoordinator, PaymentError, PaymentRequest, PaymentState,
    PaymentTransport, SharedSigner, TransactionHandle,
};

#[derive(Parser)]
#[command(name = "pay-cli")]
#[command(about = "Send x402 stablecoin payments from the command line", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `endpoint.base_url`
    #[arg(short, long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a payment and follow it to a terminal state
    Pay {
        #[arg(short, long)]
        amount: String,
        #[arg(short, long)]
        recipient: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Query the status of a transaction once
    Status { hash: String },
    /// Estimate the network fee for a payment
    Fee {
        #[arg(short, long)]
        amount: String,
        #[arg(short, long)]
        recipient: String,
    },
    /// Show the wallet's stablecoin balance
    Balance,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = load_or_default(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        config.endpoint.base_url = url;
    }
    logging::init(&config.observability.log_level);

    match cli.command {
        Commands::Pay {
            amount,
            recipient,
            description,
        } => {
            let mut request = PaymentRequest::new(amount, recipient);
            if let Some(description) = description {
                request = request.with_description(description);
            }
            pay(&config, request).await?;
        }
        Commands::Status { hash } => {
            if !is_tx_hash(&hash) {
                return Err(BlockchainError::InvalidHash(hash).into());
            }
            let transport = HttpTransport::new(&config)?;
            let report = transport.status(&TransactionHandle::new(hash)).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Fee { amount, recipient } => {
            let transport = signed_transport(&config)?;
            let fee = transport
                .estimate_fee(&PaymentRequest::new(amount, recipient))
                .await?;
            println!("Estimated network fee: {} ETH", fee);
        }
        Commands::Balance => {
            let transport = signed_transport(&config)?;
            let balance = transport.usdc_balance().await?;
            if let Some(address) = transport.signer_address() {
                println!("{}: {} USDC", address, balance);
            }
        }
    }

    Ok(())
}

fn signed_transport(config: &PayConfig) -> Result<HttpTransport, Box<dyn std::error::Error>> {
    let rpc_url: url::Url = config.chain.rpc_url.parse()?;
    let wallet = Wallet::from_env(config.chain.chain_id)?.with_rpc_url(rpc_url);
    let transport = HttpTransport::new(config)?;
    transport.bind_signer(Arc::new(SharedSigner::new(Arc::new(wallet))));
    Ok(transport)
}

async fn pay(config: &PayConfig, request: PaymentRequest) -> Result<(), Box<dyn std::error::Error>> {
    let transport = Arc::new(signed_transport(config)?);
    let coordinator = PaymentCoordinator::new(transport, config);

    let mut updates = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        let mut last = PaymentState::Idle;
        while updates.changed().await.is_ok() {
            let (state, confirmations) = {
                let current = updates.borrow_and_update();
                let confirmations = current.attempt.as_ref().map(|a| a.confirmations);
                (current.state(), confirmations)
            };
            if state != last {
                println!("-> {}", state);
                last = state;
            } else if let Some(confirmations) = confirmations {
                println!("   {} confirmations", confirmations);
            }
        }
    });

    match coordinator.submit(request).await {
        Ok(outcome) => {
            if let Some(hash) = &outcome.transaction_handle {
                println!("Transaction: {}", hash);
            }
        }
        Err(PaymentError::PaymentRequired {
            amount,
            payment_url,
        }) => {
            println!("Payment required: {} USDC due at {}", amount, payment_url);
            printer.abort();
            return Ok(());
        }
        Err(e) => {
            printer.abort();
            return Err(e.into());
        }
    }

    let settled = coordinator.settled().await;
    printer.abort();

    match settled.attempt {
        Some(attempt) if attempt.state == PaymentState::Success => {
            println!("Payment confirmed ({} confirmations)", attempt.confirmations);
            if let Some(url) = coordinator.explorer_url() {
                println!("{}", url);
            }
            Ok(())
        }
        Some(attempt) => match attempt.last_error {
            Some(e) => Err(e.into()),
            None => Err(format!("payment ended in state {}", attempt.state).into()),
        },
        None => Err("payment was reset".into()),
    }
}
