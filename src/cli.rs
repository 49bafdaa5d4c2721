//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `infra_monitor.toml` file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Tracks infrastructure servers and serves simulated telemetry for them.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address the HTTP API listens on.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Path to the SQLite database (`:memory:` for a throwaway one).
    #[arg(long, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Seconds between background simulation ticks.
    #[arg(long, value_name = "SECONDS")]
    pub tick_interval: Option<u64>,

    /// Seed for the simulation random source.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Disable the background ticker.
    #[arg(long)]
    pub no_ticker: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut server = Dict::new();
        if let Some(listen) = self.listen {
            server.insert("listen_address".into(), Value::from(listen.to_string()));
        }

        let mut database = Dict::new();
        if let Some(path) = &self.db_path {
            database.insert("path".into(), Value::from(path.to_string_lossy().to_string()));
        }

        let mut simulation = Dict::new();
        if let Some(interval) = self.tick_interval {
            simulation.insert("tick_interval_seconds".into(), Value::from(interval));
        }
        if let Some(seed) = self.seed {
            simulation.insert("seed".into(), Value::from(seed));
        }
        // Only an explicit flag overrides the file; absence keeps its value.
        if self.no_ticker {
            simulation.insert("ticker_enabled".into(), Value::from(false));
        }

        let mut dict = Dict::new();
        for (key, section) in [("server", server), ("database", database), ("simulation", simulation)] {
            if !section.is_empty() {
                dict.insert(key.into(), Value::from(section));
            }
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
