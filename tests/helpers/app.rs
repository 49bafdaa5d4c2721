#![allow(dead_code)]
//! Test helpers for running the full application instance.

use anyhow::Result;
use infra_monitor::{
    app::AppBuilder,
    config::{Config, DatabaseConfig},
    core::ServerStore,
    simulation::{random::SequenceRandom, RandomSource, SimulationEngine},
};
use reqwest::{Client, Response};
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::timeout};

/// Represents a running instance of the application for testing purposes.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub engine: Arc<SimulationEngine>,
    shutdown_tx: watch::Sender<bool>,
    app_handle: Option<JoinHandle<Result<()>>>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client.get(self.url(path)).send().await.expect("GET failed")
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST failed")
    }

    pub async fn put_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("PUT failed")
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.client.delete(self.url(path)).send().await.expect("DELETE failed")
    }

    /// Creates a server and returns its id.
    pub async fn create_server(&self, hostname: &str, ip: &str) -> i64 {
        let response = self
            .post_json("/servers", &serde_json::json!({ "hostname": hostname, "ip_address": ip }))
            .await;
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().expect("created server has an id")
    }

    pub async fn scrape(&self) -> String {
        let response = self.get("/metrics").await;
        assert_eq!(response.status(), 200);
        response.text().await.unwrap()
    }

    /// Shuts down the application and waits for it to terminate.
    /// Fails if the application does not shut down within the specified timeout.
    pub async fn shutdown(mut self, timeout_duration: Duration) -> Result<()> {
        self.shutdown_tx.send(true)?;
        if let Some(handle) = self.app_handle.take() {
            match timeout(timeout_duration, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(anyhow::anyhow!("App failed to shut down within the timeout")),
            }
        } else {
            Ok(())
        }
    }
}

/// A builder for creating `TestApp` instances with specific configurations.
pub struct TestAppBuilder {
    pub config: Config,
    store: Option<Arc<dyn ServerStore>>,
    rng: Option<Box<dyn RandomSource>>,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppBuilder {
    /// An in-memory database on an ephemeral port, no background ticker, and
    /// a random source that never fails a server.
    pub fn new() -> Self {
        let mut config = Config::default();
        config.server.listen_address = SocketAddr::from(([127, 0, 0, 1], 0));
        config.database = DatabaseConfig::in_memory();
        config.simulation.ticker_enabled = false;
        Self {
            config,
            store: None,
            rng: Some(Box::new(SequenceRandom::constant(0.5))),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ServerStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_random(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn with_ticker(mut self, interval_seconds: u64) -> Self {
        self.config.simulation.ticker_enabled = true;
        self.config.simulation.tick_interval_seconds = interval_seconds;
        self
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.config.simulation.pool_size = size;
        self
    }

    pub async fn build(self) -> Result<TestApp> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut builder = AppBuilder::new(self.config);
        if let Some(store) = self.store {
            builder = builder.store_override(store);
        }
        if let Some(rng) = self.rng {
            builder = builder.random_override(rng);
        }
        let app = builder.build(shutdown_rx).await?;
        let addr = app.api_addr();
        let engine = app.engine().clone();
        let app_handle = tokio::spawn(app.run());

        Ok(TestApp {
            addr,
            client: Client::new(),
            engine,
            shutdown_tx,
            app_handle: Some(app_handle),
        })
    }
}
