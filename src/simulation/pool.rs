//! Standalone simulated servers that have no persisted counterpart.

use crate::core::ServerSnapshot;
use crate::simulation::random::RandomSource;
use crate::simulation::server::SimulatedServer;
use std::sync::Mutex;
use std::time::Instant;

/// An ordered pool of simulation-only servers with ids `sim-1` .. `sim-N`.
#[derive(Debug)]
pub struct SimulatedPool {
    servers: Mutex<Vec<SimulatedServer>>,
}

impl SimulatedPool {
    pub fn new(size: usize) -> Self {
        let now = Instant::now();
        let servers = (1..=size)
            .map(|n| SimulatedServer::new(format!("sim-{n}"), now))
            .collect();
        Self {
            servers: Mutex::new(servers),
        }
    }

    pub fn snapshots(&self) -> Vec<ServerSnapshot> {
        self.lock().iter().map(SimulatedServer::snapshot).collect()
    }

    /// Removes the server with `id`. Returns whether it was present.
    pub fn remove(&self, id: &str) -> bool {
        let mut servers = self.lock();
        match servers.iter().position(|s| s.id() == id) {
            Some(index) => {
                servers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Advances every pooled server once.
    pub fn advance_all(&self, now: Instant, rng: &mut dyn RandomSource) -> Vec<ServerSnapshot> {
        self.lock()
            .iter_mut()
            .map(|server| server.advance_or_last_good(now, rng))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SimulatedServer>> {
        self.servers.lock().unwrap_or_else(|e| e.into_inner())
    }
}
