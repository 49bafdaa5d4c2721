//! The main application logic, decoupled from the entry point.

use crate::{
    api::{self, ApiServer, ApiState},
    config::Config,
    core::ServerStore,
    internal_metrics::{system::SystemCollector, Metrics},
    simulation::{RandomSource, SimulationEngine, StdRandom},
    store::SqliteServerStore,
    task_manager::TaskManager,
    ticker::BackgroundTicker,
};
use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    api_addr: SocketAddr,
    engine: Arc<SimulationEngine>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the HTTP API is actually bound to.
    pub fn api_addr(&self) -> SocketAddr {
        self.api_addr
    }

    pub fn engine(&self) -> &Arc<SimulationEngine> {
        &self.engine
    }

    /// Waits for the shutdown signal and then for every task to finish.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.shutdown_rx();
        shutdown_rx.changed().await.ok();
        info!("Shutdown signal received. Waiting for tasks to complete...");

        let panicked = self.task_manager.shutdown().await;
        if !panicked.is_empty() {
            anyhow::bail!("tasks panicked during shutdown: {:?}", panicked);
        }
        Ok(())
    }
}

/// Builder for the main application.
///
/// Separates constructing the components from running them, and lets tests
/// swap the store or the random source.
pub struct AppBuilder {
    config: Config,
    store_override: Option<Arc<dyn ServerStore>>,
    random_override: Option<Box<dyn RandomSource>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store_override: None,
            random_override: None,
        }
    }

    /// Uses `store` instead of opening the configured database.
    pub fn store_override(mut self, store: Arc<dyn ServerStore>) -> Self {
        self.store_override = Some(store);
        self
    }

    /// Uses `rng` instead of a `StdRandom` built from the configured seed.
    pub fn random_override(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.random_override = Some(rng);
        self
    }

    /// Builds every component, binds the listener and spawns all tasks.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        config.validate()?;
        let task_manager = TaskManager::new(shutdown_rx);

        // =========================================================================
        // 1. Persistence
        // =========================================================================
        let store: Arc<dyn ServerStore> = match self.store_override {
            Some(store) => store,
            None => Arc::new(
                SqliteServerStore::open(&config.database)
                    .await
                    .with_context(|| format!("opening database {}", config.database.path.display()))?,
            ),
        };

        // =========================================================================
        // 2. Simulation engine
        // =========================================================================
        let rng = self
            .random_override
            .unwrap_or_else(|| Box::new(StdRandom::new(config.simulation.seed)));
        let engine = Arc::new(SimulationEngine::with_random(
            store,
            config.simulation.pool_size,
            config.simulation.advance_on_scrape,
            rng,
        ));
        engine.log_summary();

        // =========================================================================
        // 3. Metrics
        // =========================================================================
        let metrics = Metrics::new(&config.metrics)?;
        if config.metrics.system_metrics_enabled {
            let collector = SystemCollector::new(
                metrics.clone(),
                Duration::from_secs(config.metrics.system_metrics_interval_seconds),
            );
            task_manager.spawn("SystemCollector", collector.run(task_manager.shutdown_rx()));
        }

        // =========================================================================
        // 4. Background ticker
        // =========================================================================
        if config.simulation.ticker_enabled {
            let ticker = BackgroundTicker::new(
                engine.clone(),
                Duration::from_secs(config.simulation.tick_interval_seconds),
            );
            task_manager.spawn("BackgroundTicker", ticker.run(task_manager.shutdown_rx()));
        } else {
            warn!("Background ticker disabled; simulations only advance on demand.");
        }

        // =========================================================================
        // 5. HTTP API
        // =========================================================================
        let router = api::router(ApiState::new(engine.clone(), Arc::new(metrics)));
        let server = ApiServer::bind(config.server.listen_address, router, task_manager.shutdown_rx())
            .await
            .with_context(|| format!("binding {}", config.server.listen_address))?;
        let api_addr = server.local_addr()?;
        task_manager.spawn("ApiServer", server.run());
        info!(%api_addr, "HTTP API listening");

        Ok(App {
            task_manager,
            api_addr,
            engine,
        })
    }
}
