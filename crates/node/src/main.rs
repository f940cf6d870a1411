//! Bidding node binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::info;

use proxybid_node::{start, NodeConfig};

#[derive(Parser)]
#[command(name = "proxybid-node")]
#[command(about = "JSON-RPC node for proxy-bid auctions")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("proxybid_node=info".parse()?)
                .add_directive("proxybid_engine=info".parse()?)
                .add_directive("jsonrpsee=warn".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };
    let addr = match args.listen {
        Some(addr) => addr,
        None => config.listen_addr()?,
    };
    let start_time = config.start_time.unwrap_or_else(Utc::now);

    info!(%addr, %start_time, "Starting bidding node");

    let (local_addr, handle) = start(addr, config.engine, start_time).await?;

    info!(%local_addr, "Bidding node running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
