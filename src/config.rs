//! Configuration management for the infra monitor
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer built-in defaults, an `infra_monitor.toml` file,
//! `INFRA_MONITOR_` environment variables, and command-line arguments.

use crate::cli::Cli;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "infra_monitor.toml";

/// Path value that selects a private in-memory database.
pub const IN_MEMORY_DB: &str = ":memory:";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Persistence settings.
    pub database: DatabaseConfig,
    /// Simulation engine and background ticker settings.
    pub simulation: SimulationConfig,
    /// Metrics exposition settings.
    pub metrics: MetricsConfig,
}

/// HTTP listener settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// The address the HTTP API binds to.
    pub listen_address: SocketAddr,
}

/// Persistence settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file, or `:memory:`.
    pub path: PathBuf,
    /// How long a statement waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(IN_MEMORY_DB),
            busy_timeout_ms: 5000,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_DB
    }
}

/// Simulation engine and background ticker settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimulationConfig {
    /// Number of standalone simulated servers created at startup.
    pub pool_size: usize,
    /// Seconds between two background ticks.
    pub tick_interval_seconds: u64,
    /// Whether the background ticker runs at all.
    pub ticker_enabled: bool,
    /// If true, a scrape advances every persisted server's simulation before
    /// rendering. If false, the scrape reports the last ticked values.
    pub advance_on_scrape: bool,
    /// Seed for the random source. Entropy is used when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Metrics exposition settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MetricsConfig {
    /// Bucket upper bounds for `http_request_latency_seconds`.
    pub latency_buckets: Vec<f64>,
    /// Publish CPU and memory usage of this process.
    pub system_metrics_enabled: bool,
    /// Seconds between two process metric samples.
    pub system_metrics_interval_seconds: u64,
    /// Seconds after which a gauge that was not set again is dropped from
    /// the exposition, e.g. for deleted servers. 0 keeps gauges forever.
    pub stale_gauge_seconds: u64,
}

impl Config {
    /// Loads the application configuration.
    ///
    /// Sources are merged in increasing order of precedence: defaults, the
    /// TOML file (from `--config` or `infra_monitor.toml`), environment
    /// variables, then command-line arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // e.g. INFRA_MONITOR_SIMULATION__TICK_INTERVAL_SECONDS=10
            .merge(Env::prefixed("INFRA_MONITOR_").split("__"))
            .merge(cli.clone())
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.simulation.tick_interval_seconds == 0 {
            anyhow::bail!("simulation.tick_interval_seconds must be at least 1");
        }
        if self.metrics.system_metrics_interval_seconds == 0 {
            anyhow::bail!("metrics.system_metrics_interval_seconds must be at least 1");
        }
        if self.metrics.latency_buckets.is_empty() {
            anyhow::bail!("metrics.latency_buckets must not be empty");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                listen_address: SocketAddr::from(([0, 0, 0, 0], 5000)),
            },
            database: DatabaseConfig {
                path: PathBuf::from("infra_monitor.db"),
                busy_timeout_ms: 5000,
            },
            simulation: SimulationConfig {
                pool_size: 3,
                tick_interval_seconds: 5,
                ticker_enabled: true,
                advance_on_scrape: true,
                seed: None,
            },
            metrics: MetricsConfig {
                latency_buckets: vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
                system_metrics_enabled: false,
                system_metrics_interval_seconds: 5,
                stale_gauge_seconds: 300,
            },
        }
    }
}
