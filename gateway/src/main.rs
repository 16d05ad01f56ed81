//! txledger Gateway Binary
//!
//! Builds the ledger engine, seeds it from the bootstrap feed and serves it
//! until Ctrl+C.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use txledger_gateway::{bootstrap, Gateway, GatewayConfig};
use txledger_ledger::LedgerEngine;

/// txledger gateway
#[derive(Parser, Debug)]
#[command(name = "txledger-gateway")]
#[command(about = "Serve the txledger engine over TCP")]
struct Args {
    /// Server hostname
    #[arg(long)]
    host: Option<String>,

    /// Server port number
    #[arg(long)]
    port: Option<u16>,

    /// JSON bootstrap feed of transaction records
    #[arg(long = "json-db")]
    json_db: Option<String>,

    /// Default request budget in milliseconds
    #[arg(long)]
    request_timeout_ms: Option<u64>,
}

impl Args {
    fn apply(self, config: &mut GatewayConfig) {
        if let Some(host) = self.host {
            config.listen_addr = host;
        }
        if let Some(port) = self.port {
            config.listen_port = port;
        }
        if let Some(path) = self.json_db {
            config.json_db = Some(path);
        }
        if let Some(ms) = self.request_timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = GatewayConfig::from_env();
    args.apply(&mut config);

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting txledger gateway");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let engine = Arc::new(LedgerEngine::new());
    if let Err(e) = bootstrap(&engine, config.json_db.as_deref().map(Path::new)) {
        error!(error = %e, "Bootstrap failed");
        return Err(e.into());
    }

    let gateway = Arc::new(Gateway::new(config.clone(), engine.clone()));
    let listener = gateway.bind().await?;

    info!(
        listen_addr = %config.listen_addr,
        listen_port = config.listen_port,
        accounts = engine.account_count(),
        "Gateway running"
    );

    gateway
        .serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await?;

    info!("Gateway shutdown complete");
    Ok(())
}
