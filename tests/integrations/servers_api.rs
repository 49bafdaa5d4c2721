//! End-to-end tests of the servers and simulated-servers HTTP API.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::{app::TestAppBuilder, metrics::server_gauge};
use infra_monitor::store::UnavailableStore;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};

#[tokio::test]
async fn test_server_lifecycle_end_to_end() {
    let app = TestAppBuilder::new().build().await.unwrap();

    let response = app
        .post_json("/servers", &json!({ "hostname": "test-server", "ip_address": "10.0.0.1" }))
        .await;
    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["status"], "RUNNING");
    assert_eq!(created["hostname"], "test-server");
    let id = created["id"].as_i64().unwrap();

    let fetched: Value = app.get(&format!("/servers/{id}")).await.json().await.unwrap();
    assert_eq!(fetched["hostname"], "test-server");
    assert_eq!(fetched["ip_address"], "10.0.0.1");

    let response = app.put_json(&format!("/servers/{id}"), &json!({ "status": "FAILED" })).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Server updated");
    assert_eq!(body["server"]["status"], "FAILED");

    let fetched: Value = app.get(&format!("/servers/{id}")).await.json().await.unwrap();
    assert_eq!(fetched["status"], "FAILED");
    assert_eq!(fetched["hostname"], "test-server");

    let response = app.delete(&format!("/servers/{id}")).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Server deleted");

    assert_eq!(app.get(&format!("/servers/{id}")).await.status(), 404);
    assert_eq!(app.delete(&format!("/servers/{id}")).await.status(), 404);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let app = TestAppBuilder::new().build().await.unwrap();

    let missing_ip = app.post_json("/servers", &json!({ "hostname": "web" })).await;
    assert_eq!(missing_ip.status(), 400);
    let body: Value = missing_ip.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("ip_address"));

    let bad_status = app
        .post_json(
            "/servers",
            &json!({ "hostname": "web", "ip_address": "10.0.0.2", "status": "SLEEPING" }),
        )
        .await;
    assert_eq!(bad_status.status(), 400);

    let bad_cpu = app
        .post_json(
            "/servers",
            &json!({ "hostname": "web", "ip_address": "10.0.0.2", "cpu_usage": 150.0 }),
        )
        .await;
    assert_eq!(bad_cpu.status(), 400);

    let id = app.create_server("web", "10.0.0.2").await;
    let duplicate = app
        .post_json("/servers", &json!({ "hostname": "other", "ip_address": "10.0.0.2" }))
        .await;
    assert_eq!(duplicate.status(), 400);

    let bad_update = app.put_json(&format!("/servers/{id}"), &json!({ "uptime": -5 })).await;
    assert_eq!(bad_update.status(), 400);
    assert_eq!(app.put_json("/servers/999", &json!({ "hostname": "x" })).await.status(), 404);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_list_servers_in_insertion_order() {
    let app = TestAppBuilder::new().build().await.unwrap();
    let empty: Vec<Value> = app.get("/servers").await.json().await.unwrap();
    assert!(empty.is_empty());

    app.create_server("web-1", "10.0.0.1").await;
    app.create_server("web-2", "10.0.0.2").await;

    let servers: Vec<Value> = app.get("/servers").await.json().await.unwrap();
    let names: Vec<&str> = servers.iter().map(|s| s["hostname"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["web-1", "web-2"]);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_server_metrics_advances_and_reconciles() {
    let app = TestAppBuilder::new().build().await.unwrap();
    let id = app.create_server("web-1", "10.0.0.1").await;

    let response = app.get(&format!("/servers/{id}/metrics")).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["server_id"], id);
    assert_eq!(body["hostname"], "web-1");
    // Every draw is 0.5: no failure, cpu at the middle of 10..90, memory at
    // the middle of 256..2048.
    assert_eq!(body["metrics"]["state"], "RUNNING");
    assert_eq!(body["metrics"]["cpu"], 50.0);
    assert_eq!(body["metrics"]["memory"], 1152);

    let row: Value = app.get(&format!("/servers/{id}")).await.json().await.unwrap();
    assert_eq!(row["cpu_usage"], 50.0);
    assert_eq!(row["memory_usage"], 1152);
    assert_eq!(row["status"], "RUNNING");

    assert_eq!(app.get("/servers/999/metrics").await.status(), 404);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_update_reseeds_simulation_from_row() {
    let app = TestAppBuilder::new().build().await.unwrap();
    let id = app.create_server("web-1", "10.0.0.1").await;
    app.get(&format!("/servers/{id}/metrics")).await;

    app.put_json(&format!("/servers/{id}"), &json!({ "status": "BOOTING" })).await;
    let body: Value = app.get(&format!("/servers/{id}/metrics")).await.json().await.unwrap();
    // Reseeded BOOTING with zeroed metrics; a 0.5 draw does not finish the boot.
    assert_eq!(body["metrics"]["state"], "BOOTING");
    assert_eq!(body["metrics"]["cpu"], 0.0);
    assert_eq!(body["metrics"]["memory"], 0);

    let row: Value = app.get(&format!("/servers/{id}")).await.json().await.unwrap();
    assert_eq!(row["status"], "BOOTING");
    assert_eq!(row["memory_usage"], 0);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_simulated_servers_list_and_delete() {
    let app = TestAppBuilder::new().with_pool_size(3).build().await.unwrap();

    let pool: Vec<Value> = app.get("/simulated-servers").await.json().await.unwrap();
    let ids: Vec<&str> = pool.iter().map(|s| s["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["sim-1", "sim-2", "sim-3"]);
    assert!(pool.iter().all(|s| s["state"] == "RUNNING"));

    let response = app.delete("/simulated-servers/sim-2").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "status": "deleted" }));

    let response = app.delete("/simulated-servers/sim-2").await;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "server not found" }));

    let pool: Vec<Value> = app.get("/simulated-servers").await.json().await.unwrap();
    assert_eq!(pool.len(), 2);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_root_and_health_report_database_state() {
    let app = TestAppBuilder::new().build().await.unwrap();
    assert_eq!(app.get("/").await.text().await.unwrap(), "Infra Monitor API running!");
    let health: Value = app.get("/health").await.json().await.unwrap();
    assert_eq!(health, json!({ "status": "ok", "db": "connected" }));
    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_unavailable_store_degrades_gracefully() {
    let app = TestAppBuilder::new()
        .with_store(Arc::new(UnavailableStore))
        .build()
        .await
        .unwrap();

    assert_eq!(
        app.get("/").await.text().await.unwrap(),
        "Infra Monitor API running! (DB error)"
    );
    let health: Value = app.get("/health").await.json().await.unwrap();
    assert_eq!(health["db"], "error");

    assert_eq!(app.get("/servers").await.status(), 503);
    let create = app
        .post_json("/servers", &json!({ "hostname": "web", "ip_address": "10.0.0.1" }))
        .await;
    assert_eq!(create.status(), 503);

    // The scrape falls back to the standalone pool.
    let text = app.scrape().await;
    assert_eq!(server_gauge(&text, "server_state", "sim-1"), Some(1.0));

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}
