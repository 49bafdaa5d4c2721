//! Tests of the Prometheus scrape endpoint.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::{
    app::TestAppBuilder,
    metrics::{server_gauge, sum_of},
};
use infra_monitor::simulation::random::SequenceRandom;
use std::time::Duration;

#[tokio::test]
async fn test_empty_store_reports_standalone_pool() {
    let app = TestAppBuilder::new().with_pool_size(2).build().await.unwrap();

    let response = app.get("/metrics").await;
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    let text = response.text().await.unwrap();

    assert_eq!(server_gauge(&text, "server_state", "sim-1"), Some(1.0));
    assert_eq!(server_gauge(&text, "server_state", "sim-2"), Some(1.0));
    assert_eq!(server_gauge(&text, "server_state", "sim-3"), None);
    assert!(server_gauge(&text, "server_cpu_usage", "sim-1").is_some());
    assert!(server_gauge(&text, "server_memory_usage", "sim-1").is_some());

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_persisted_servers_replace_pool_in_scrape() {
    let app = TestAppBuilder::new().build().await.unwrap();
    let id = app.create_server("web-1", "10.0.0.1").await.to_string();

    let text = app.scrape().await;
    assert_eq!(server_gauge(&text, "server_state", &id), Some(1.0));
    assert_eq!(server_gauge(&text, "server_cpu_usage", &id), Some(50.0));
    assert_eq!(server_gauge(&text, "server_memory_usage", &id), Some(1152.0));
    assert_eq!(server_gauge(&text, "server_state", "sim-1"), None);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_failed_server_is_exported_as_zero() {
    let app = TestAppBuilder::new()
        .with_random(Box::new(SequenceRandom::constant(0.01)))
        .build()
        .await
        .unwrap();
    let id = app.create_server("web-1", "10.0.0.1").await.to_string();

    let text = app.scrape().await;
    assert_eq!(server_gauge(&text, "server_state", &id), Some(0.0));
    assert_eq!(server_gauge(&text, "server_cpu_usage", &id), Some(0.0));

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_requests_are_counted_and_timed() {
    let app = TestAppBuilder::new().build().await.unwrap();
    let id = app.create_server("web-1", "10.0.0.1").await;
    app.get("/health").await;
    app.get(&format!("/servers/{id}")).await;
    app.get(&format!("/servers/{id}")).await;
    app.scrape().await;

    let text = app.scrape().await;
    // create, health, two gets and the first scrape
    assert!(sum_of(&text, "requests_total") >= 5.0);
    assert!(text.contains(r#"endpoint="/servers/{id}""#));
    assert!(text.contains(r#"method="GET""#));
    assert!(text.contains(r#"http_request_latency_seconds_bucket{endpoint="/health""#));
    assert!(!text.contains(r#"http_request_latency_seconds_count{endpoint="/metrics"}"#));
    assert!(text.lines().any(|line| line.starts_with("requests_by_endpoint{")
        && line.contains(r#"endpoint="/metrics""#)
        && line.contains(r#"method="GET""#)));

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_unmatched_paths_share_one_label() {
    let app = TestAppBuilder::new().build().await.unwrap();
    assert_eq!(app.get("/nope/123").await.status(), 404);
    assert_eq!(app.get("/nope/456").await.status(), 404);

    let text = app.scrape().await;
    assert!(!text.contains("/nope/"), "got:\n{text}");
    assert!(text.lines().any(|line| line.starts_with("requests_by_endpoint{")
        && line.contains(r#"endpoint="unmatched""#)
        && line.ends_with(" 2")));

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_pool_is_advanced_by_scrapes_without_ticker() {
    let app = TestAppBuilder::new()
        .with_random(Box::new(SequenceRandom::constant(0.01)))
        .build()
        .await
        .unwrap();

    let text = app.scrape().await;
    assert_eq!(server_gauge(&text, "server_state", "sim-1"), Some(0.0));
    let pool: Vec<serde_json::Value> = app.get("/simulated-servers").await.json().await.unwrap();
    assert!(pool.iter().all(|s| s["state"] == "FAILED"));

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}
