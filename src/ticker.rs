//! The background ticker: advances every simulation at a fixed interval and
//! reconciles the results into the store.

use crate::simulation::SimulationEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct BackgroundTicker {
    engine: Arc<SimulationEngine>,
    interval: Duration,
}

impl BackgroundTicker {
    pub fn new(engine: Arc<SimulationEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Ticks until shutdown is signalled.
    ///
    /// A tick already in progress runs to completion; the shutdown signal is
    /// only observed between ticks.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Background ticker started.");
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Background ticker received shutdown signal.");
                    break;
                }
                _ = interval.tick() => {
                    let report = self.engine.tick().await;
                    ticks += 1;
                    if report.store_failed {
                        warn!(tick = ticks, "Tick finished without reaching the store");
                    }
                    debug!(
                        tick = ticks,
                        pool = report.pool_advanced,
                        persisted = report.persisted_advanced,
                        written = report.rows_written,
                        "Tick complete"
                    );
                }
            }
        }
        info!(ticks, "Background ticker finished.");
    }
}
