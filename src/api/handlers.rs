//! HTTP handlers. CRUD handlers talk to the store, while everything that
//! touches simulations goes through the engine.

use crate::api::requests::{CreateServerRequest, UpdateServerRequest};
use crate::api::ApiState;
use crate::core::{Server, ServerSnapshot};
use crate::error::ApiError;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

pub async fn root(State(state): State<ApiState>) -> String {
    info!("New request received at /");
    let mut status = String::from("Infra Monitor API running!");
    if let Err(e) = state.engine.store().ping().await {
        error!(error = %e, "DB connection error");
        status.push_str(" (DB error)");
    }
    status
}

pub async fn health(State(state): State<ApiState>) -> Json<Value> {
    let db = match state.engine.store().ping().await {
        Ok(()) => "connected",
        Err(e) => {
            error!(error = %e, "Health DB check failed");
            "error"
        }
    };
    Json(json!({ "status": "ok", "db": db }))
}

pub async fn metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshots = state.engine.scrape_snapshots().await;
    let body = state.metrics.scrape(&snapshots);
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}

pub async fn list_simulated_servers(State(state): State<ApiState>) -> Json<Vec<ServerSnapshot>> {
    info!("Simulated servers endpoint called");
    Json(state.engine.pool().snapshots())
}

pub async fn delete_simulated_server(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if state.engine.pool().remove(&id) {
        info!(server_id = %id, "Deleted simulated server");
        Ok(Json(json!({ "status": "deleted" })))
    } else {
        Err(ApiError::NotFound("server not found".to_string()))
    }
}

pub async fn create_server(
    State(state): State<ApiState>,
    Json(body): Json<CreateServerRequest>,
) -> Result<(StatusCode, Json<Server>), ApiError> {
    let new_server = body.validate().inspect_err(|e| {
        warn!(error = %e, "Invalid server creation attempt");
    })?;
    let server = state.engine.store().create(new_server).await?;
    info!(server_id = server.id, hostname = %server.hostname, "Server created");
    Ok((StatusCode::CREATED, Json(server)))
}

pub async fn list_servers(State(state): State<ApiState>) -> Result<Json<Vec<Server>>, ApiError> {
    Ok(Json(state.engine.store().list().await?))
}

pub async fn get_server(State(state): State<ApiState>, Path(id): Path<i64>) -> Result<Json<Server>, ApiError> {
    match state.engine.store().get(id).await? {
        Some(server) => Ok(Json(server)),
        None => Err(not_found("Get", id)),
    }
}

pub async fn update_server(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateServerRequest>,
) -> Result<Json<Value>, ApiError> {
    let update = body.validate().inspect_err(|e| {
        warn!(server_id = id, error = %e, "Invalid server update");
    })?;
    match state.engine.update_server(id, update).await? {
        Some(server) => {
            info!(server_id = id, "Server updated");
            Ok(Json(json!({ "message": "Server updated", "server": server })))
        }
        None => Err(not_found("Update", id)),
    }
}

pub async fn delete_server(State(state): State<ApiState>, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    if state.engine.delete_server(id).await? {
        info!(server_id = id, "Server deleted");
        Ok(Json(json!({ "message": "Server deleted" })))
    } else {
        Err(not_found("Delete", id))
    }
}

pub async fn server_metrics(State(state): State<ApiState>, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let Some((server, snapshot)) = state.engine.server_metrics(id).await? else {
        return Err(not_found("Metrics", id));
    };
    Ok(Json(json!({
        "server_id": server.id,
        "hostname": server.hostname,
        "metrics": {
            "cpu": snapshot.cpu_usage,
            "memory": snapshot.memory_usage,
            "uptime": snapshot.uptime,
            "state": snapshot.state,
        }
    })))
}

fn not_found(action: &str, id: i64) -> ApiError {
    warn!(server_id = id, "{} failed, server not found", action);
    ApiError::NotFound("Server not found".to_string())
}
