//! Infra Monitor - server inventory and simulated fleet metrics.

use anyhow::Result;
use clap::Parser;
use infra_monitor::{app::App, cli::Cli, config::Config};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        tracing_subscriber::fmt().with_env_filter(EnvFilter::new("error")).init();
        error!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Infra Monitor starting up...");

    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Listen Address: {}", config.server.listen_address);
    info!("Database: {}", config.database.path.display());
    info!("Simulated Pool Size: {}", config.simulation.pool_size);
    info!(
        "Background Ticker: {}",
        if config.simulation.ticker_enabled {
            format!("every {}s", config.simulation.tick_interval_seconds)
        } else {
            "Disabled".to_string()
        }
    );
    info!("Advance On Scrape: {}", config.simulation.advance_on_scrape);
    match config.simulation.seed {
        Some(seed) => info!("Random Seed: {}", seed),
        None => info!("Random Seed: entropy"),
    }
    info!(
        "Process Metrics: {}",
        if config.metrics.system_metrics_enabled {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await?;
    let app_handle = tokio::spawn(app.run());

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, initiating graceful shutdown...");
    shutdown_tx.send(true).ok();

    app_handle.await??;
    info!("Infra Monitor has shut down gracefully.");
    Ok(())
}
