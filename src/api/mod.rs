//! The HTTP surface: CRUD for persisted servers, the standalone simulation
//! pool, health probes and the metrics scrape.

pub mod handlers;
pub mod middleware;
pub mod requests;
pub mod server;

use crate::internal_metrics::{Metrics, METRICS_ENDPOINT};
use crate::simulation::SimulationEngine;
use axum::{
    routing::{delete, get},
    Router,
};
use std::sync::Arc;

pub use server::ApiServer;

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct ApiState {
    pub engine: Arc<SimulationEngine>,
    pub metrics: Arc<Metrics>,
}

impl ApiState {
    pub fn new(engine: Arc<SimulationEngine>, metrics: Arc<Metrics>) -> Self {
        Self { engine, metrics }
    }
}

/// Builds the full router with request tracking applied to every route.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route(METRICS_ENDPOINT, get(handlers::metrics))
        .route("/simulated-servers", get(handlers::list_simulated_servers))
        .route("/simulated-servers/{id}", delete(handlers::delete_simulated_server))
        .route("/servers", get(handlers::list_servers).post(handlers::create_server))
        .route(
            "/servers/{id}",
            get(handlers::get_server)
                .put(handlers::update_server)
                .delete(handlers::delete_server),
        )
        .route("/servers/{id}/metrics", get(handlers::server_metrics))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::track_requests))
        .with_state(state)
}
