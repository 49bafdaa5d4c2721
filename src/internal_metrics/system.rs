//! # System Metrics Collector
//!
//! The `SystemCollector` runs in a dedicated background task, periodically
//! querying the operating system for this process's CPU and memory usage via
//! the `sysinfo` crate and publishing them through `Metrics`.

use crate::internal_metrics::Metrics;
use std::time::Duration;
use sysinfo::System;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info};

/// A collector for process-level resource metrics.
pub struct SystemCollector {
    system: System,
    metrics: Metrics,
    interval: Duration,
}

impl SystemCollector {
    pub fn new(metrics: Metrics, interval: Duration) -> Self {
        Self {
            system: System::new(),
            metrics,
            interval,
        }
    }

    /// Samples the process every `interval` until shutdown is signalled or
    /// the process can no longer be found.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => pid,
            Err(e) => {
                error!("Failed to get current PID: {}", e);
                return;
            }
        };
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        debug!(%pid, "System metrics collector started.");

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("System metrics collector received shutdown signal.");
                    break;
                }
                _ = interval.tick() => {
                    // `refresh_process` returns false once the process is gone.
                    if !self.system.refresh_process(pid) {
                        error!(%pid, "Monitored process no longer found. Collector is shutting down.");
                        break;
                    }
                    if let Some(process) = self.system.process(pid) {
                        self.metrics
                            .record_process_usage(process.cpu_usage() as f64, process.memory() as f64);
                    }
                }
            }
        }
    }
}
