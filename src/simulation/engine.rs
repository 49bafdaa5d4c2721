//! Ties the simulations to the persisted store.
//!
//! The engine owns the registry of persisted-server simulations, the
//! standalone pool, and the random source. No lock is held across a store
//! call. Instead, rows are matched to simulations against the registry's
//! removal generation, and a read that raced with a delete or update is
//! retried, so a removed simulation is never re-created from a stale row.

use crate::{
    config::SimulationConfig,
    core::{Server, ServerSnapshot, ServerStore, ServerUpdate},
    error::StoreError,
    simulation::{
        pool::SimulatedPool,
        random::{RandomSource, StdRandom},
        registry::{SharedSimulation, SimulationRegistry},
        server::SimulatedServer,
    },
};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of one background tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Standalone pool servers advanced.
    pub pool_advanced: usize,
    /// Persisted servers advanced.
    pub persisted_advanced: usize,
    /// Rows written back to the store.
    pub rows_written: usize,
    /// Whether the store could not be read or written.
    pub store_failed: bool,
}

pub struct SimulationEngine {
    store: Arc<dyn ServerStore>,
    registry: SimulationRegistry,
    pool: SimulatedPool,
    rng: Mutex<Box<dyn RandomSource>>,
    advance_on_scrape: bool,
}

/// Reads of the store retried when a removal races with them.
const TRACK_ATTEMPTS: usize = 3;

impl std::fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("tracked", &self.registry.len())
            .field("pool", &self.pool.len())
            .field("advance_on_scrape", &self.advance_on_scrape)
            .finish_non_exhaustive()
    }
}

impl SimulationEngine {
    pub fn new(store: Arc<dyn ServerStore>, config: &SimulationConfig) -> Self {
        Self::with_random(
            store,
            config.pool_size,
            config.advance_on_scrape,
            Box::new(StdRandom::new(config.seed)),
        )
    }

    pub fn with_random(
        store: Arc<dyn ServerStore>,
        pool_size: usize,
        advance_on_scrape: bool,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            store,
            registry: SimulationRegistry::new(),
            pool: SimulatedPool::new(pool_size),
            rng: Mutex::new(rng),
            advance_on_scrape,
        }
    }

    pub fn store(&self) -> &Arc<dyn ServerStore> {
        &self.store
    }

    pub fn registry(&self) -> &SimulationRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &SimulatedPool {
        &self.pool
    }

    /// Advances one simulation by a single step.
    fn advance(&self, sim: &SharedSimulation, now: Instant) -> ServerSnapshot {
        let mut sim = sim.lock().unwrap_or_else(|e| e.into_inner());
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        sim.advance_or_last_good(now, rng.as_mut())
    }

    fn current(sim: &SharedSimulation) -> ServerSnapshot {
        sim.lock().unwrap_or_else(|e| e.into_inner()).snapshot()
    }

    /// Lists every persisted row and pairs it with its simulation, dropping
    /// simulations whose row is gone.
    ///
    /// If removals keep racing with the listing, only simulations that
    /// already exist are returned.
    async fn list_tracked(&self) -> Result<Vec<(i64, SharedSimulation)>, StoreError> {
        for _ in 0..TRACK_ATTEMPTS {
            let observed = self.registry.generation();
            let rows = self.store.list().await?;
            if let Some(tracked) = self.registry.track_if_unchanged(&rows, observed) {
                return Ok(tracked);
            }
            debug!("Servers removed while listing, listing again");
        }
        let rows = self.store.list().await?;
        Ok(self.registry.existing(&rows))
    }

    /// Writes snapshots back to their rows. Failures are logged, not returned.
    async fn reconcile(&self, batch: &[(i64, ServerSnapshot)]) -> Option<usize> {
        match self.store.apply_snapshots(batch).await {
            Ok(written) => Some(written),
            Err(e) => {
                error!(error = %e, rows = batch.len(), "Failed to reconcile simulated state to the store");
                None
            }
        }
    }

    /// Advances the simulation of persisted server `id` and reconciles it.
    ///
    /// Returns `Ok(None)` if no such row exists.
    pub async fn server_metrics(&self, id: i64) -> Result<Option<(Server, ServerSnapshot)>, StoreError> {
        for _ in 0..TRACK_ATTEMPTS {
            let observed = self.registry.generation();
            let Some(row) = self.store.get(id).await? else {
                return Ok(None);
            };
            if let Some(sim) = self.registry.ensure_if_unchanged(&row, observed) {
                return Ok(Some(self.advance_and_reconcile(row, &sim).await));
            }
            debug!(server_id = id, "Server changed while reading it, reading again");
        }

        // Still racing: step a throwaway simulation rather than register one
        // from a row that may already be gone.
        let Some(row) = self.store.get(id).await? else {
            return Ok(None);
        };
        let sim = match self.registry.get(&id.to_string()) {
            Some(sim) => sim,
            None => Arc::new(Mutex::new(SimulatedServer::from_row(&row, Instant::now()))),
        };
        Ok(Some(self.advance_and_reconcile(row, &sim).await))
    }

    async fn advance_and_reconcile(&self, row: Server, sim: &SharedSimulation) -> (Server, ServerSnapshot) {
        let snapshot = self.advance(sim, Instant::now());
        self.reconcile(&[(row.id, snapshot.clone())]).await;
        (row, snapshot)
    }

    /// Applies a partial update. The server's simulation is discarded so the
    /// next reference seeds it from the updated row.
    pub async fn update_server(&self, id: i64, update: ServerUpdate) -> Result<Option<Server>, StoreError> {
        let updated = self.store.update(id, update).await?;
        if updated.is_some() {
            self.registry.remove(&id.to_string());
        }
        Ok(updated)
    }

    /// Deletes a persisted server together with its simulation.
    pub async fn delete_server(&self, id: i64) -> Result<bool, StoreError> {
        let deleted = self.store.delete(id).await?;
        self.registry.remove(&id.to_string());
        Ok(deleted)
    }

    /// Snapshots to expose on a scrape.
    ///
    /// With no persisted servers (or an unreachable store) the standalone pool
    /// is reported instead, so the scrape is never empty while the pool has
    /// members. Either set is advanced first when `advance_on_scrape` is set.
    pub async fn scrape_snapshots(&self) -> Vec<ServerSnapshot> {
        let count = self.store.count().await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not count servers for scrape, using standalone pool");
            0
        });
        if count == 0 {
            if !self.advance_on_scrape {
                return self.pool.snapshots();
            }
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            return self.pool.advance_all(Instant::now(), rng.as_mut());
        }

        let tracked = match self.list_tracked().await {
            Ok(tracked) => tracked,
            Err(e) => {
                warn!(error = %e, "Could not list servers for scrape");
                return Vec::new();
            }
        };

        if !self.advance_on_scrape {
            return tracked.iter().map(|(_, sim)| Self::current(sim)).collect();
        }

        let now = Instant::now();
        let batch: Vec<(i64, ServerSnapshot)> = tracked
            .iter()
            .map(|(id, sim)| (*id, self.advance(sim, now)))
            .collect();
        self.reconcile(&batch).await;
        batch.into_iter().map(|(_, snapshot)| snapshot).collect()
    }

    /// One background step: advance the pool and every persisted server,
    /// then write the persisted snapshots back as one batch.
    pub async fn tick(&self) -> TickReport {
        let now = Instant::now();
        let pool_advanced = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            self.pool.advance_all(now, rng.as_mut()).len()
        };
        let mut report = TickReport {
            pool_advanced,
            ..Default::default()
        };

        let tracked = match self.list_tracked().await {
            Ok(tracked) => tracked,
            Err(e) => {
                error!(error = %e, "Tick could not list persisted servers");
                report.store_failed = true;
                return report;
            }
        };

        let batch: Vec<(i64, ServerSnapshot)> = tracked
            .iter()
            .map(|(id, sim)| (*id, self.advance(sim, now)))
            .collect();
        report.persisted_advanced = batch.len();

        match self.reconcile(&batch).await {
            Some(written) => report.rows_written = written,
            None => report.store_failed = true,
        }
        report
    }

    /// Logs a one-line summary of what the engine tracks.
    pub fn log_summary(&self) {
        info!(
            pool = self.pool.len(),
            tracked = self.registry.len(),
            advance_on_scrape = self.advance_on_scrape,
            "Simulation engine ready"
        );
    }
}
