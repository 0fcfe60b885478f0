//! Integration tests for the API layer.
//!
//! These tests spin up a real HTTP server on a random port backed by a
//! coordinator with stub handlers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use switchboard_api::{create_router, AppState};
use switchboard_common::{Confidence, Execution, Handler, HandlerStatus, Result};
use switchboard_coordinator::{Coordinator, CoordinatorConfig};

/// Replies after `delay` when the query mentions `keyword`.
struct KeywordHandler {
    name: &'static str,
    keyword: &'static str,
    reply: &'static str,
    delay: Duration,
}

#[async_trait]
impl Handler for KeywordHandler {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "keyword stub"
    }

    fn tools(&self) -> Vec<String> {
        vec!["stub_tool".into()]
    }

    fn score(&self, query: &str) -> Result<Confidence> {
        Ok(if query.to_lowercase().contains(self.keyword) { 0.9 } else { 0.0 })
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, _query: &str, _context: Option<&Value>) -> Execution {
        tokio::time::sleep(self.delay).await;
        Execution::success(self.reply, self.delay)
    }

    fn status(&self) -> HandlerStatus {
        HandlerStatus {
            name: self.name.into(),
            description: "keyword stub".into(),
            tools: self.tools(),
            model: "stub".into(),
            initialized: true,
            conversation_length: 0,
        }
    }
}

fn stub_coordinator() -> Coordinator {
    let coordinator = Coordinator::new(CoordinatorConfig::default());
    coordinator.register(Arc::new(KeywordHandler {
        name: "WeatherAgent",
        keyword: "weather",
        reply: "Sunny.",
        delay: Duration::ZERO,
    }));
    coordinator.register(Arc::new(KeywordHandler {
        name: "SlowAgent",
        keyword: "slow",
        reply: "Eventually.",
        delay: Duration::from_secs(5),
    }));
    coordinator
}

/// Spin up a test server on a random port and return the base URL.
async fn start_server(coordinator: Coordinator, timeout: Duration) -> String {
    let state = AppState::new(Arc::new(coordinator)).with_request_timeout(timeout);
    let router = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}", addr)
}

async fn start_test_server() -> String {
    let coordinator = stub_coordinator();
    coordinator.initialize().await.unwrap();
    start_server(coordinator, Duration::from_millis(200)).await
}

/// Helper to GET a URL and return (status, body).
async fn get(base: &str, path: &str) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .get(format!("{}{}", base, path))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

/// Helper to POST JSON and return (status, body string).
async fn post_json(base: &str, path: &str, json: &str) -> (u16, String) {
    let resp = reqwest::Client::new()
        .post(format!("{}{}", base, path))
        .header("content-type", "application/json")
        .body(json.to_string())
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.text().await.unwrap())
}

// ============================================================================
// Health endpoint
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let base = start_test_server().await;
    let (status, body) = get(&base, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["coordinator_initialized"], true);
}

// ============================================================================
// Query endpoint
// ============================================================================

#[tokio::test]
async fn test_query_returns_envelope() {
    let base = start_test_server().await;
    let (status, body) = post_json(
        &base,
        "/query/text",
        r#"{"query": "What's the weather?", "user_id": "u1"}"#,
    )
    .await;
    assert_eq!(status, 200);

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["agent_used"], "WeatherAgent");
    assert_eq!(json["response"], "Sunny.");
    assert_eq!(json["user_id"], "u1");
    assert!(json["request_id"].as_str().unwrap().starts_with("req_"));
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_unmatched_query_reports_no_agent() {
    let base = start_test_server().await;
    let (status, body) = post_json(&base, "/query/text", r#"{"query": "asdkjasd"}"#).await;
    assert_eq!(status, 200);

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["agent_used"], "none");
    assert_eq!(json["error"], "No suitable agent found");
    assert_eq!(json["user_id"], "default");
}

#[tokio::test]
async fn test_empty_query_is_rejected() {
    let base = start_test_server().await;
    let (status, body) = post_json(&base, "/query/text", r#"{"query": "   "}"#).await;
    assert_eq!(status, 400);
    assert!(body.contains("EMPTY_QUERY"));
}

#[tokio::test]
async fn test_uninitialized_coordinator_returns_503() {
    let base = start_server(stub_coordinator(), Duration::from_secs(1)).await;
    let (status, body) = post_json(&base, "/query/text", r#"{"query": "weather"}"#).await;
    assert_eq!(status, 503);
    assert!(body.contains("NOT_INITIALIZED"));
}

#[tokio::test]
async fn test_slow_query_times_out_with_504() {
    let base = start_test_server().await;
    let (status, body) = post_json(&base, "/query/text", r#"{"query": "something slow"}"#).await;
    assert_eq!(status, 504);

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["agent_used"], "coordinator");
    assert_eq!(json["error"], "Request timed out after 200ms");
}

#[tokio::test]
async fn test_oversized_payload_is_rejected() {
    let base = start_test_server().await;
    let large = "x".repeat(100_000);
    let (status, _body) = post_json(
        &base,
        "/query/text",
        &format!(r#"{{"query": "{}"}}"#, large),
    )
    .await;
    assert_eq!(status, 413, "Expected 413 Payload Too Large, got {}", status);
}

// ============================================================================
// Status and history endpoints
// ============================================================================

#[tokio::test]
async fn test_agents_status() {
    let base = start_test_server().await;
    post_json(&base, "/query/text", r#"{"query": "weather"}"#).await;

    let (status, body) = get(&base, "/agents/status").await;
    assert_eq!(status, 200);
    assert_eq!(body["coordinator_initialized"], true);
    assert_eq!(body["total_agents"], 2);
    assert_eq!(body["total_queries"], 1);
    assert_eq!(body["agents"][0]["name"], "WeatherAgent");
}

#[tokio::test]
async fn test_history_filters_by_user() {
    let base = start_test_server().await;
    post_json(&base, "/query/text", r#"{"query": "weather one", "user_id": "u1"}"#).await;
    post_json(&base, "/query/text", r#"{"query": "weather two", "user_id": "u2"}"#).await;
    post_json(&base, "/query/text", r#"{"query": "weather three", "user_id": "u1"}"#).await;

    let (status, all) = get(&base, "/history").await;
    assert_eq!(status, 200);
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (_, u1) = get(&base, "/history?user_id=u1").await;
    let queries: Vec<&str> = u1
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["query"].as_str().unwrap())
        .collect();
    assert_eq!(queries, vec!["weather one", "weather three"]);
}
