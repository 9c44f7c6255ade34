//! Integration tests for the HTTP intake
//!
//! Most tests drive the axum router in-process with `tower::ServiceExt`;
//! one binds a real socket and talks to it with reqwest.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use sdk::errors::EngineError;
use sdk::LocalSearch;
use switchboard_engine::api;
use switchboard_engine::config::Config;
use switchboard_engine::db::Database;
use switchboard_engine::llm::{CompletionProvider, Result};
use switchboard_engine::orchestrator::Orchestrator;

struct CannedModel;

#[async_trait]
impl CompletionProvider for CannedModel {
    fn name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok("NONE".to_string())
    }
}

struct OneHit;

#[async_trait]
impl LocalSearch for OneHit {
    fn name(&self) -> &str {
        "one-hit"
    }

    async fn search(&self, query: &str, _limit: usize) -> std::result::Result<Vec<Value>, EngineError> {
        Ok(vec![json!({"match": query})])
    }
}

async fn app(
    temp_dir: &TempDir,
    local_search: Option<Arc<dyn LocalSearch>>,
) -> (Arc<Orchestrator>, Database) {
    let toml = format!("[core]\ndata_dir = {:?}\n", temp_dir.path());
    let config = Config::from_toml_str(&toml).unwrap();
    let database = Database::new(&config.db_path()).await.unwrap();
    let orchestrator = Orchestrator::new(
        &config,
        Arc::new(database.services()),
        Arc::new(CannedModel),
        local_search,
    );
    (Arc::new(orchestrator), database)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(orchestrator: &Arc<Orchestrator>, request: Request<Body>) -> (StatusCode, Value) {
    let response = api::router(Arc::clone(orchestrator))
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_register_and_list() {
    let temp_dir = TempDir::new().unwrap();
    let (orchestrator, database) = app(&temp_dir, None).await;

    let (status, body) = send(
        &orchestrator,
        post_json(
            "/register_service",
            json!({
                "id": "svc-a",
                "name": "ServiceA",
                "endpoint": "http://svc/a/",
                "request_format": {"keywords": ["find", "id"]}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "registered", "total_services": 1}));

    let (status, body) = send(&orchestrator, get("/services")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"services": [{"id": "svc-a", "name": "ServiceA", "endpoint": "http://svc/a"}]})
    );

    database.close().await.unwrap();
}

#[tokio::test]
async fn test_register_rejects_missing_fields() {
    let temp_dir = TempDir::new().unwrap();
    let (orchestrator, database) = app(&temp_dir, None).await;

    let (status, body) = send(
        &orchestrator,
        post_json("/register_service", json!({"name": "ServiceA"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &orchestrator,
        post_json(
            "/register_service",
            json!({"id": " ", "name": "ServiceA", "endpoint": "http://svc"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    database.close().await.unwrap();
}

#[tokio::test]
async fn test_ask_always_returns_ok() {
    let temp_dir = TempDir::new().unwrap();
    let (orchestrator, database) = app(&temp_dir, None).await;

    send(
        &orchestrator,
        post_json(
            "/register_service",
            json!({
                "id": "svc-a",
                "name": "ServiceA",
                "endpoint": "http://127.0.0.1:1",
                "request_format": {"keywords": ["find"]}
            }),
        ),
    )
    .await;

    let (status, body) = send(
        &orchestrator,
        post_json("/ask", json!({"prompt": "please find item 42"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "ServiceA");
    assert!(body["error"].is_string());

    let (status, body) = send(
        &orchestrator,
        post_json("/ask", json!({"prompt": "hello there"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"service": null, "response": "NONE"}));

    database.close().await.unwrap();
}

#[tokio::test]
async fn test_internal_search() {
    let temp_dir = TempDir::new().unwrap();

    let (orchestrator, database) = app(&temp_dir, None).await;
    let (status, body) = send(
        &orchestrator,
        post_json("/internal/search", json!({"query": "bolts"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({"error": "Local service unavailable"}));
    database.close().await.unwrap();

    let temp_dir = TempDir::new().unwrap();
    let (orchestrator, database) = app(&temp_dir, Some(Arc::new(OneHit))).await;
    let (status, body) = send(
        &orchestrator,
        post_json("/internal/search", json!({"query": "bolts"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"results": [{"match": "bolts"}]}));
    database.close().await.unwrap();
}

#[tokio::test]
async fn test_health() {
    let temp_dir = TempDir::new().unwrap();
    let (orchestrator, database) = app(&temp_dir, None).await;

    let (status, body) = send(&orchestrator, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "services": 0}));

    database.close().await.unwrap();
}

#[tokio::test]
async fn test_serve_until_shutdown() {
    let temp_dir = TempDir::new().unwrap();
    let (orchestrator, database) = app(&temp_dir, None).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(api::serve(listener, orchestrator, async move {
        rx.await.ok();
    }));

    let body: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();

    database.close().await.unwrap();
}
