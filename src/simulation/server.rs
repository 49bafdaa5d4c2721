//! The probabilistic lifecycle of one simulated server.

use crate::core::{Server, ServerSnapshot, ServerState};
use crate::simulation::random::RandomSource;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use tracing::{error, warn};

/// Chance per advance that a server fails outright, whatever its state.
pub const FAILURE_PROBABILITY: f64 = 0.05;
/// Chance per advance that a FAILED server starts booting.
pub const RECOVERY_PROBABILITY: f64 = 0.3;
/// Chance per advance that a BOOTING server comes up.
pub const BOOT_PROBABILITY: f64 = 0.5;

pub const CPU_RANGE: (f64, f64) = (10.0, 90.0);
/// Memory usage bounds in MB.
pub const MEMORY_RANGE_MB: (i64, i64) = (256, 2048);

/// One server's simulated lifecycle and resource usage.
///
/// CPU and memory are zero whenever the state is not RUNNING, and uptime
/// restarts from zero on every entry into BOOTING or FAILED.
#[derive(Debug, Clone)]
pub struct SimulatedServer {
    id: String,
    state: ServerState,
    cpu_usage: f64,
    memory_usage: i64,
    uptime: i64,
    last_advanced_at: Instant,
    last_good: ServerSnapshot,
}

impl SimulatedServer {
    /// A fresh server in the initial RUNNING state.
    pub fn new(id: impl Into<String>, now: Instant) -> Self {
        Self::seeded(id, ServerState::Running, 0.0, 0, 0, now)
    }

    /// A server starting from known state and metrics.
    pub fn seeded(
        id: impl Into<String>,
        state: ServerState,
        cpu_usage: f64,
        memory_usage: i64,
        uptime: i64,
        now: Instant,
    ) -> Self {
        let mut server = Self {
            id: id.into(),
            state,
            cpu_usage: cpu_usage.clamp(0.0, 100.0),
            memory_usage: memory_usage.max(0),
            uptime: uptime.max(0),
            last_advanced_at: now,
            last_good: placeholder_snapshot(),
        };
        if state != ServerState::Running {
            server.cpu_usage = 0.0;
            server.memory_usage = 0;
        }
        if state == ServerState::Booting || state == ServerState::Failed {
            server.uptime = 0;
        }
        server.last_good = server.snapshot();
        server
    }

    /// Mirrors a persisted row. A status that is not a known state is seeded
    /// as FAILED, matching how the gauge encodes unknown states.
    pub fn from_row(server: &Server, now: Instant) -> Self {
        let state = server.status.parse::<ServerState>().unwrap_or_else(|e| {
            warn!(server_id = server.id, error = %e, "Unknown persisted status, seeding as FAILED");
            ServerState::Failed
        });
        Self::seeded(
            server.id.to_string(),
            state,
            server.cpu_usage,
            server.memory_usage,
            server.uptime,
            now,
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            id: self.id.clone(),
            state: self.state,
            cpu_usage: self.cpu_usage,
            memory_usage: self.memory_usage,
            uptime: self.uptime,
        }
    }

    /// Runs one step of the state machine at time `now`.
    ///
    /// The first draw decides spontaneous failure. Otherwise the FAILED,
    /// BOOTING and RUNNING checks run in that order with a fresh draw each,
    /// so a single step can go FAILED -> BOOTING -> RUNNING.
    pub fn advance(&mut self, now: Instant, rng: &mut dyn RandomSource) -> ServerSnapshot {
        let elapsed = now.saturating_duration_since(self.last_advanced_at);
        self.last_advanced_at = now;

        if rng.next_f64() < FAILURE_PROBABILITY {
            self.enter(ServerState::Failed);
        } else {
            if self.state == ServerState::Failed && rng.next_f64() < RECOVERY_PROBABILITY {
                self.enter(ServerState::Booting);
            }
            if self.state == ServerState::Booting && rng.next_f64() < BOOT_PROBABILITY {
                self.state = ServerState::Running;
            }
            if self.state == ServerState::Running {
                let cpu = rng.range_f64(CPU_RANGE.0, CPU_RANGE.1);
                self.cpu_usage = (cpu * 100.0).round() / 100.0;
                self.memory_usage = rng.range_i64(MEMORY_RANGE_MB.0, MEMORY_RANGE_MB.1);
                self.uptime = self.uptime.saturating_add(elapsed.as_secs() as i64);
            }
        }

        self.last_good = self.snapshot();
        self.last_good.clone()
    }

    /// Like `advance`, but a panic inside the step is contained: the server
    /// is rolled back to its last good snapshot, which is returned.
    pub fn advance_or_last_good(&mut self, now: Instant, rng: &mut dyn RandomSource) -> ServerSnapshot {
        match catch_unwind(AssertUnwindSafe(|| self.advance(now, rng))) {
            Ok(snapshot) => snapshot,
            Err(_) => {
                error!(server_id = %self.id, "Simulation step panicked, keeping last good snapshot");
                self.restore_last_good();
                self.last_good.clone()
            }
        }
    }

    fn enter(&mut self, state: ServerState) {
        self.state = state;
        self.cpu_usage = 0.0;
        self.memory_usage = 0;
        self.uptime = 0;
    }

    fn restore_last_good(&mut self) {
        let last = self.last_good.clone();
        self.state = last.state;
        self.cpu_usage = last.cpu_usage;
        self.memory_usage = last.memory_usage;
        self.uptime = last.uptime;
    }
}

fn placeholder_snapshot() -> ServerSnapshot {
    ServerSnapshot {
        id: String::new(),
        state: ServerState::Running,
        cpu_usage: 0.0,
        memory_usage: 0,
        uptime: 0,
    }
}
