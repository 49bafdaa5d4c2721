//! The background ticker reconciles simulated state into persisted rows.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::app::TestAppBuilder;
use infra_monitor::simulation::random::SequenceRandom;
use serde_json::Value;
use std::time::Duration;

#[tokio::test]
async fn test_ticker_writes_simulated_state_back() {
    let app = TestAppBuilder::new()
        .with_random(Box::new(SequenceRandom::constant(0.01)))
        .with_ticker(1)
        .build()
        .await
        .unwrap();
    let id = app.create_server("web-1", "10.0.0.1").await;

    let mut status = Value::Null;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let row: Value = app.get(&format!("/servers/{id}")).await.json().await.unwrap();
        status = row["status"].clone();
        if status == "FAILED" {
            break;
        }
    }
    assert_eq!(status, "FAILED");

    let pool: Vec<Value> = app.get("/simulated-servers").await.json().await.unwrap();
    assert!(pool.iter().all(|s| s["state"] == "FAILED"));

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_deleted_server_is_not_resurrected_by_ticks() {
    let app = TestAppBuilder::new().with_ticker(1).build().await.unwrap();
    let id = app.create_server("web-1", "10.0.0.1").await;

    assert_eq!(app.delete(&format!("/servers/{id}")).await.status(), 200);
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(app.get(&format!("/servers/{id}")).await.status(), 404);
    assert!(app.engine.registry().get(&id.to_string()).is_none());

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}
