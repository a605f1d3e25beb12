//! Shared cache tier against a mock Upstash REST endpoint.

use std::time::{Duration, Instant};

use serde_json::json;
use tickercache_market_data::{CacheStore, DeleteOutcome, SetOutcome, UpstashCacheStore, UpstashConfig};
use wiremock::matchers::{body_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(server: &MockServer, max_retries: u32) -> UpstashCacheStore {
    UpstashCacheStore::new(UpstashConfig {
        url: Some(server.uri()),
        token: Some("upstash-token".to_string()),
        max_retries,
        retry_backoff: Duration::from_millis(10),
        ..Default::default()
    })
}

#[tokio::test]
async fn set_sends_command_array_with_ttl() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer upstash-token"))
        .and(body_json(json!(["SET", "stock:quote:AAPL:finnhub", "{\"price\":1}", "EX", "86400"])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "OK" })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = store(&server, 0)
        .set(
            "stock:quote:AAPL:finnhub",
            "{\"price\":1}".to_string(),
            Duration::from_secs(86_400),
        )
        .await;
    assert_eq!(outcome, SetOutcome::Stored);
}

#[tokio::test]
async fn get_hit_and_miss() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!(["GET", "present"])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "[1,2]" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_json(json!(["GET", "absent"])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": null })))
        .mount(&server)
        .await;

    let store = store(&server, 0);
    assert!(store.is_shared());
    assert_eq!(store.get("present").await.as_deref(), Some("[1,2]"));
    assert!(store.get("absent").await.is_none());
}

#[tokio::test]
async fn delete_reports_removed_then_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!(["DEL", "k"])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": 1 })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_json(json!(["DEL", "k"])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": 0 })))
        .mount(&server)
        .await;

    let store = store(&server, 0);
    assert_eq!(store.delete("k").await, DeleteOutcome::Removed);
    assert_eq!(store.delete("k").await, DeleteOutcome::NotFound);
}

#[tokio::test]
async fn command_error_degrades_to_miss() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "WRONGPASS invalid token" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server, 2);
    assert!(store.get("k").await.is_none());
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "OK" })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = store(&server, 2)
        .set("k", "v".to_string(), Duration::from_secs(60))
        .await;
    assert_eq!(outcome, SetOutcome::Stored);
}

#[tokio::test]
async fn retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let outcome = store(&server, 2)
        .set("k", "v".to_string(), Duration::from_secs(60))
        .await;
    assert_eq!(outcome, SetOutcome::Failed);
}

#[tokio::test]
async fn hung_endpoint_is_a_miss_within_the_ceiling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "result": "late" }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let store = UpstashCacheStore::new(UpstashConfig {
        url: Some(server.uri()),
        token: Some("upstash-token".to_string()),
        max_retries: 2,
        retry_backoff: Duration::from_millis(10),
        timeout: Duration::from_millis(300),
    });

    let started = Instant::now();
    assert!(store.get("k").await.is_none());
    assert_eq!(
        store.set("k", "v".to_string(), Duration::from_secs(60)).await,
        SetOutcome::Failed
    );
    assert!(started.elapsed() < Duration::from_secs(2));
}
