//! Integration tests for the Service Router
//!
//! Drives the model-assisted stage through a real Ollama client pointed at
//! a mock server.

use serde_json::json;
use std::sync::Arc;
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

use sdk::types::ServiceDescriptor;
use switchboard_engine::directory::ServiceCatalog;
use switchboard_engine::llm::ollama::OllamaProvider;
use switchboard_engine::router::{RouteDecision, ServiceRouter};

fn catalog() -> ServiceCatalog {
    let mut catalog = ServiceCatalog::new();
    catalog.upsert(
        ServiceDescriptor::new("a", "ServiceA", "http://svc/a")
            .with_description("Finds items by id")
            .with_keywords(["find", "id"]),
    );
    catalog.upsert(
        ServiceDescriptor::new("b", "ServiceB", "http://svc/b")
            .with_description("Weather forecasts"),
    );
    catalog
}

async fn chat_replying(reply: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": reply}}]
        })))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_keyword_hit_makes_no_model_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let router = ServiceRouter::new(Arc::new(OllamaProvider::new(server.uri(), "m")));
    let decision = router.route("please find item 42", &catalog()).await;

    assert_eq!(decision.service(), Some("ServiceA"));
}

#[tokio::test]
async fn test_model_reply_with_surrounding_prose() {
    let server = chat_replying("The best match is ServiceB for this.").await;

    let router = ServiceRouter::new(Arc::new(OllamaProvider::new(server.uri(), "m")));
    let decision = router.route("will it rain tomorrow", &catalog()).await;

    assert_eq!(
        decision,
        RouteDecision::Model {
            service: "ServiceB".to_string()
        }
    );
}

#[tokio::test]
async fn test_model_reply_none() {
    let server = chat_replying("none").await;

    let router = ServiceRouter::new(Arc::new(OllamaProvider::new(server.uri(), "m")));
    let decision = router.route("tell me a joke", &catalog()).await;

    assert_eq!(decision, RouteDecision::NoSelection);
}

#[tokio::test]
async fn test_selection_prompt_sent_to_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("ServiceB: Weather forecasts"))
        .and(body_string_contains("tell me a joke"))
        .respond_with(ResponseTemplate::new(200).set_body_string("NONE"))
        .expect(1)
        .mount(&server)
        .await;

    let router = ServiceRouter::new(Arc::new(OllamaProvider::new(server.uri(), "m")));
    router.route("tell me a joke", &catalog()).await;
}

#[tokio::test]
async fn test_unreachable_model_is_no_selection() {
    let router = ServiceRouter::new(Arc::new(OllamaProvider::new("http://127.0.0.1:1", "m")));
    let decision = router.route("tell me a joke", &catalog()).await;

    assert_eq!(decision, RouteDecision::NoSelection);
}
