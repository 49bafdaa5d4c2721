//! Maps persisted server ids to their simulations.

use crate::core::Server;
use crate::simulation::server::SimulatedServer;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tracing::debug;

/// A simulation shared between the request path and the background ticker.
pub type SharedSimulation = Arc<Mutex<SimulatedServer>>;

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, SharedSimulation>,
    /// Bumped by every removal.
    generation: u64,
}

/// Holds at most one `SimulatedServer` per persisted id.
///
/// Lookups share a read lock; inserts and removals take the write lock only
/// for the map operation itself, so callers working on different ids never
/// wait on each other's simulation steps.
///
/// Rows read from the store before a removal must not re-create the removed
/// simulation. Callers read `generation()` before querying the store and pass
/// it to the `*_if_unchanged` methods, which refuse to insert when a removal
/// happened in between.
#[derive(Debug, Default)]
pub struct SimulationRegistry {
    entries: RwLock<Entries>,
}

impl SimulationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of removals so far.
    pub fn generation(&self) -> u64 {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).generation
    }

    /// Returns the simulation for `server`, seeding a new one from the row if
    /// none exists yet. Repeated calls return the same instance.
    pub fn ensure(&self, server: &Server) -> SharedSimulation {
        self.ensure_with(&server.id.to_string(), || {
            SimulatedServer::from_row(server, Instant::now())
        })
    }

    /// Returns the simulation registered under `id`, creating it with `seed`
    /// if absent. Concurrent first calls for the same id agree on a single
    /// instance.
    pub fn ensure_with(&self, id: &str, seed: impl FnOnce() -> SimulatedServer) -> SharedSimulation {
        if let Some(existing) = self.get(id) {
            return existing;
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries
            .map
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(seed())))
            .clone()
    }

    /// Like `ensure`, but returns `None` instead of seeding a new simulation
    /// if anything was removed since `observed`.
    pub fn ensure_if_unchanged(&self, server: &Server, observed: u64) -> Option<SharedSimulation> {
        let id = server.id.to_string();
        if let Some(existing) = self.get(&id) {
            return Some(existing);
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.generation != observed {
            return None;
        }
        Some(
            entries
                .map
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(SimulatedServer::from_row(server, Instant::now()))))
                .clone(),
        )
    }

    /// Makes the registry mirror `rows`: seeds a simulation for every row and
    /// drops simulations without one. Returns the simulations in row order, or
    /// `None` without changing anything if a removal happened since
    /// `observed`.
    pub fn track_if_unchanged(&self, rows: &[Server], observed: u64) -> Option<Vec<(i64, SharedSimulation)>> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.generation != observed {
            return None;
        }

        let live: HashSet<String> = rows.iter().map(|row| row.id.to_string()).collect();
        let before = entries.map.len();
        entries.map.retain(|id, _| live.contains(id));
        let dropped = before - entries.map.len();
        if dropped > 0 {
            debug!(dropped, "Dropped simulations without a persisted row");
        }

        let now = Instant::now();
        Some(
            rows.iter()
                .map(|row| {
                    let sim = entries
                        .map
                        .entry(row.id.to_string())
                        .or_insert_with(|| Arc::new(Mutex::new(SimulatedServer::from_row(row, now))))
                        .clone();
                    (row.id, sim)
                })
                .collect(),
        )
    }

    /// The existing simulations for `rows`, in row order. Never inserts.
    pub fn existing(&self, rows: &[Server]) -> Vec<(i64, SharedSimulation)> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        rows.iter()
            .filter_map(|row| entries.map.get(&row.id.to_string()).map(|sim| (row.id, sim.clone())))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<SharedSimulation> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .map
            .get(id)
            .cloned()
    }

    /// Drops the simulation for `id`. Returns whether one existed.
    pub fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.generation += 1;
        entries.map.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
