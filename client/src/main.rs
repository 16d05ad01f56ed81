//! txledger CLI
//!
//! Sends one debit, credit or balance query to a gateway and prints the result.

use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use txledger_client::{ClientConfig, LedgerClient};
use txledger_common::{Currency, Money};
use txledger_ledger::TransactionRecord;

/// txledger command-line client
#[derive(Parser, Debug)]
#[command(name = "txledger")]
#[command(about = "Debit, credit and query accounts on a txledger gateway")]
struct Args {
    /// Gateway address [default: localhost:50091]
    #[arg(long)]
    server_addr: Option<String>,

    /// Request budget in milliseconds [default: 10000]
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the balance and latest record of an account
    Balance {
        /// Account token
        #[arg(default_value = "zambam")]
        token: String,
    },
    /// Withdraw from an account
    Debit(ActionArgs),
    /// Deposit into an account
    Credit(ActionArgs),
}

#[derive(ClapArgs, Debug)]
struct ActionArgs {
    /// Account token
    token: String,

    /// Amount in minor units
    amount: u64,

    /// ISO 4217 currency code
    currency: Currency,

    /// Idempotency reference
    #[arg(long)]
    reference: String,

    /// Caller timestamp (RFC 3339), defaults to the gateway's receipt time
    #[arg(long)]
    timestamp: Option<DateTime<Utc>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env();
    if let Some(addr) = args.server_addr {
        config.server_addr = addr;
    }
    if let Some(ms) = args.timeout_ms {
        config.request_timeout = Duration::from_millis(ms);
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let mut client = LedgerClient::with_config(config).await?;

    match args.command {
        Command::Balance { token } => {
            let summary = client.get_balance(&token).await?;
            println!("{}: {}", token, summary.balance);
            print_record(&summary.last_transaction);
        }
        Command::Debit(action) => {
            let amount = Money::new(action.amount, action.currency);
            info!(token = %action.token, %amount, "Debiting");
            let record = client
                .debit(&action.token, amount, action.reference, action.timestamp)
                .await?;
            print_record(&record);
        }
        Command::Credit(action) => {
            let amount = Money::new(action.amount, action.currency);
            info!(token = %action.token, %amount, "Crediting");
            let record = client
                .credit(&action.token, amount, action.reference, action.timestamp)
                .await?;
            print_record(&record);
        }
    }

    Ok(())
}

fn print_record(record: &TransactionRecord) {
    println!(
        "#{} {:?} {} ref={} at {}: {} -> {}",
        record.sequence,
        record.action.kind,
        record.action.amount,
        record.action.reference,
        record.action.timestamp.to_rfc3339(),
        record.reaction.previous_balance,
        record.reaction.new_balance,
    );
}
