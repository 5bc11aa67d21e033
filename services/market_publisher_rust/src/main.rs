use anyhow::{Context, Result};
use dotenv::dotenv;
use market_publisher_rust::loops::{spawn_all, LoopContext};
use market_publisher_rust::{Config, Supervisor};
use std::sync::Arc;
use ticker_core::clients::{IndicatorClient, YahooClient};
use ticker_core::StoreGuard;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Rust Market Publisher Service...");

    // Config
    let config = Config::from_env().context("Invalid configuration")?;

    // Redis
    let store = StoreGuard::connect(config.store.clone())
        .await
        .context("Failed to connect to Redis")?;

    // Clients
    let provider = YahooClient::new(config.yahoo.clone(), config.pacing.clone())
        .context("Failed to build Yahoo client")?;
    let indicators = IndicatorClient::new(config.indicator_endpoints.clone())
        .context("Failed to build indicator client")?;

    let ctx = LoopContext {
        provider: Arc::new(provider),
        indicators: Arc::new(indicators),
        store: Arc::new(store),
        config: Arc::new(config.clone()),
    };

    // Loops
    let mut supervisor = Supervisor::new(config.restart_delay);
    spawn_all(&mut supervisor, ctx);

    // Wait for signal
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
        }
    }

    supervisor.shutdown();
    Ok(())
}
