//! Relay Edge Service - Main Entry Point

use anyhow::Context;
use tracing::info;

use relay_edge::observability::init_logging;
use relay_edge::{start_server, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    init_logging(config.log_format, &config.log_filter)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config,
        "Starting Relay Edge Service"
    );

    start_server(&config).await?;

    info!("Relay Edge Service stopped");
    Ok(())
}
