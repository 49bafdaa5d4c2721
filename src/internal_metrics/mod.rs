//! # Internal Metrics Module
//!
//! This module owns the Prometheus recorder behind the `/metrics` endpoint.
//!
//! ## Components:
//!
//! - **`Metrics`**: A cloneable handle over a private `PrometheusRecorder`.
//!   It records request counters and latency, publishes the per-server
//!   gauges from simulation snapshots, and renders the exposition text.
//!
//! - **`SystemCollector`**: (Defined in `system.rs`) A background task that
//!   periodically publishes the CPU and memory usage of this process.
//!
//! Gauges that are not set again within `stale_gauge_seconds` expire, so
//! servers that were deleted, or the standalone pool once persisted servers
//! exist, leave the exposition.
//!
//! The recorder is not installed globally; every macro call runs under
//! `metrics::with_local_recorder`, so several `Metrics` instances (one per
//! test app, for example) never observe each other's series.

use crate::config::MetricsConfig;
use crate::core::{ServerSnapshot, ServerState};
use anyhow::Result;
use metrics::{Counter, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use metrics_util::MetricKindMask;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod system;

/// Path of the scrape endpoint. Requests to it are counted but not timed.
pub const METRICS_ENDPOINT: &str = "/metrics";

/// The public API for the metrics system.
#[derive(Clone)]
pub struct Metrics {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
    requests_total: Counter,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Builds the recorder and registers descriptions for every series.
    pub fn new(config: &MetricsConfig) -> Result<Self> {
        let mut builder = PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Full("http_request_latency_seconds".to_string()),
            &config.latency_buckets,
        )?;
        if config.stale_gauge_seconds > 0 {
            builder = builder.idle_timeout(
                MetricKindMask::GAUGE,
                Some(Duration::from_secs(config.stale_gauge_seconds)),
            );
        }
        let recorder = builder.build_recorder();
        let handle = recorder.handle();
        let recorder = Arc::new(recorder);

        let requests_total = metrics::with_local_recorder(recorder.as_ref(), || {
            metrics::describe_counter!("requests_total", Unit::Count, "Total number of requests");
            metrics::describe_counter!("requests_by_endpoint", Unit::Count, "HTTP requests by endpoint and method");
            metrics::describe_histogram!("http_request_latency_seconds", Unit::Seconds, "HTTP request latency in seconds");
            metrics::describe_gauge!("server_cpu_usage", Unit::Percent, "CPU usage percentage");
            metrics::describe_gauge!("server_memory_usage", "Memory usage MB");
            metrics::describe_gauge!("server_state", "Server state (0=FAILED,1=RUNNING,2=BOOTING)");
            metrics::describe_gauge!("process_cpu_usage_percent", Unit::Percent, "The percentage of CPU time this process is currently using.");
            metrics::describe_gauge!("process_memory_usage_bytes", Unit::Bytes, "The resident set size of this process, in bytes.");

            metrics::counter!("requests_total")
        });

        Ok(Self {
            recorder,
            handle,
            requests_total,
        })
    }

    /// Records one served request. `/metrics` is excluded from latency.
    pub fn record_request(&self, endpoint: &str, method: &str, elapsed: Duration) {
        self.requests_total.increment(1);
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::counter!(
                "requests_by_endpoint",
                "endpoint" => endpoint.to_string(),
                "method" => method.to_string()
            )
            .increment(1);
            if endpoint != METRICS_ENDPOINT {
                metrics::histogram!("http_request_latency_seconds", "endpoint" => endpoint.to_string())
                    .record(elapsed.as_secs_f64());
            }
        });
    }

    /// Sets the three gauges of one server. `state` is encoded with
    /// FAILED=0, RUNNING=1, BOOTING=2; anything else is reported as 0.
    pub fn record_server(&self, server_id: &str, cpu_usage: f64, memory_usage: f64, state: &str) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            let id = server_id.to_string();
            metrics::gauge!("server_cpu_usage", "server_id" => id.clone()).set(cpu_usage);
            metrics::gauge!("server_memory_usage", "server_id" => id.clone()).set(memory_usage);
            metrics::gauge!("server_state", "server_id" => id).set(ServerState::gauge_value_for(state));
        });
    }

    pub fn record_servers(&self, snapshots: &[ServerSnapshot]) {
        for snapshot in snapshots {
            self.record_server(
                &snapshot.id,
                snapshot.cpu_usage,
                snapshot.memory_usage as f64,
                snapshot.state.as_str(),
            );
        }
    }

    /// Publishes this process's own resource usage.
    pub fn record_process_usage(&self, cpu_percent: f64, memory_bytes: f64) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::gauge!("process_cpu_usage_percent").set(cpu_percent);
            metrics::gauge!("process_memory_usage_bytes").set(memory_bytes);
        });
    }

    /// Renders every series in the Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Publishes `snapshots` and renders the result.
    pub fn scrape(&self, snapshots: &[ServerSnapshot]) -> String {
        self.record_servers(snapshots);
        info!("Metrics scraped for {} servers", snapshots.len());
        self.render()
    }
}
