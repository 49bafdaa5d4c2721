//! Core domain types and service traits for the infra monitor
//!
//! This module defines the persisted `Server` record, the lifecycle states
//! shared by persisted and simulated servers, and the `ServerStore` trait
//! that every persistence backend implements.

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServerState {
    Booting,
    Running,
    Failed,
}

impl ServerState {
    pub const ALL: [ServerState; 3] = [ServerState::Booting, ServerState::Running, ServerState::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Booting => "BOOTING",
            ServerState::Running => "RUNNING",
            ServerState::Failed => "FAILED",
        }
    }

    /// Numeric encoding used by the `server_state` gauge.
    pub fn gauge_value(&self) -> f64 {
        match self {
            ServerState::Failed => 0.0,
            ServerState::Running => 1.0,
            ServerState::Booting => 2.0,
        }
    }

    /// Encodes a raw state string for the `server_state` gauge.
    ///
    /// Unrecognized values are reported as FAILED (0).
    pub fn gauge_value_for(raw: &str) -> f64 {
        raw.parse::<ServerState>()
            .map(|state| state.gauge_value())
            .unwrap_or(0.0)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the known lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid state '{0}', expected one of BOOTING, RUNNING, FAILED")]
pub struct InvalidState(pub String);

impl FromStr for ServerState {
    type Err = InvalidState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BOOTING" => Ok(ServerState::Booting),
            "RUNNING" => Ok(ServerState::Running),
            "FAILED" => Ok(ServerState::Failed),
            other => Err(InvalidState(other.to_string())),
        }
    }
}

/// A durable record of a tracked server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: i64,
    pub hostname: String,
    pub ip_address: String,
    /// Stored as free text; the API only ever writes known states.
    pub status: String,
    pub cpu_usage: f64,
    /// Memory usage in MB.
    pub memory_usage: i64,
    /// Seconds spent continuously RUNNING.
    pub uptime: i64,
}

/// Validated input for creating a server.
#[derive(Debug, Clone, PartialEq)]
pub struct NewServer {
    pub hostname: String,
    pub ip_address: String,
    pub status: ServerState,
    pub cpu_usage: f64,
    pub memory_usage: i64,
    pub uptime: i64,
}

/// A partial update. `None` fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerUpdate {
    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub status: Option<ServerState>,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<i64>,
    pub uptime: Option<i64>,
}

impl ServerUpdate {
    /// Applies this update on top of an existing record.
    pub fn apply_to(&self, server: &mut Server) {
        if let Some(hostname) = &self.hostname {
            server.hostname = hostname.clone();
        }
        if let Some(ip_address) = &self.ip_address {
            server.ip_address = ip_address.clone();
        }
        if let Some(status) = self.status {
            server.status = status.to_string();
        }
        if let Some(cpu_usage) = self.cpu_usage {
            server.cpu_usage = cpu_usage;
        }
        if let Some(memory_usage) = self.memory_usage {
            server.memory_usage = memory_usage;
        }
        if let Some(uptime) = self.uptime {
            server.uptime = uptime;
        }
    }
}

/// Point-in-time view of a simulated server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub id: String,
    pub state: ServerState,
    pub cpu_usage: f64,
    pub memory_usage: i64,
    pub uptime: i64,
}

/// Durable storage for `Server` records.
#[async_trait]
pub trait ServerStore: Send + Sync {
    /// Connectivity probe.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    async fn list(&self) -> Result<Vec<Server>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Server>, StoreError>;

    async fn create(&self, server: NewServer) -> Result<Server, StoreError>;

    /// Returns `None` if no row has the given id.
    async fn update(&self, id: i64, update: ServerUpdate) -> Result<Option<Server>, StoreError>;

    /// Returns `false` if no row had the given id.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    /// Writes the simulated state, cpu, memory and uptime of each snapshot
    /// onto the row with the same id, committing them as one batch.
    ///
    /// Returns the number of rows written. Snapshots whose row no longer
    /// exists are skipped.
    async fn apply_snapshots(&self, snapshots: &[(i64, ServerSnapshot)]) -> Result<usize, StoreError>;
}
