//! End-to-end scenarios through the Orchestrator
//!
//! Uses a real SQLite registry in a temp directory, a wiremock Ollama and
//! wiremock downstream services.

use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use sdk::types::{DispatchOutcome, RequestFormat, ServiceRecord, ServiceRegistration};
use switchboard_engine::config::Config;
use switchboard_engine::db::Database;
use switchboard_engine::llm::ollama::OllamaProvider;
use switchboard_engine::orchestrator::Orchestrator;

fn test_config(data_dir: &Path, llm_url: &str) -> Config {
    let toml = format!(
        r#"
[core]
data_dir = {:?}

[llm]
base_url = "{}"
model = "test-model"

[registry]
fetch_timeout_secs = 1
startup_budget_secs = 5
"#,
        data_dir, llm_url
    );
    Config::from_toml_str(&toml).unwrap()
}

async fn model_replying(reply: &str) -> MockServer {
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

fn registration(id: &str, name: &str, endpoint: &str, keywords: &[&str]) -> ServiceRegistration {
    ServiceRegistration {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(format!("{} service", name)),
        system_prompt: None,
        request_format: Some(RequestFormat::with_keywords(keywords.iter().copied())),
        endpoint: endpoint.to_string(),
    }
}

async fn orchestrator(config: &Config) -> (Orchestrator, Database) {
    let database = Database::new(&config.db_path()).await.unwrap();
    let llm = Arc::new(OllamaProvider::from_config(&config.llm));
    let orchestrator = Orchestrator::new(config, Arc::new(database.services()), llm, None);
    (orchestrator, database)
}

#[tokio::test]
async fn test_keyword_route_dispatches_to_makejob() {
    let temp_dir = TempDir::new().unwrap();
    let model = model_replying("NONE").await;
    let service = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/a/makejob"))
        .and(query_param("request", "please find item 42"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&service)
        .await;

    let config = test_config(temp_dir.path(), &model.uri());
    let (orchestrator, database) = orchestrator(&config).await;

    let endpoint = format!("{}/a", service.uri());
    orchestrator
        .register(registration("svc-a", "ServiceA", &endpoint, &["find", "id"]))
        .await
        .unwrap();

    let outcome = orchestrator.handle_request("please find item 42").await;
    assert_eq!(
        outcome,
        DispatchOutcome::success(Some("ServiceA"), json!({"id": 42}))
    );

    database.close().await.unwrap();
}

#[tokio::test]
async fn test_model_fallback_routes_to_named_service() {
    let temp_dir = TempDir::new().unwrap();
    let model = model_replying("The best match is ServiceB for this.").await;
    let service_b = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/makejob"))
        .respond_with(ResponseTemplate::new(200).set_body_string("sunny"))
        .expect(1)
        .mount(&service_b)
        .await;

    let config = test_config(temp_dir.path(), &model.uri());
    let (orchestrator, database) = orchestrator(&config).await;

    orchestrator
        .register(registration("svc-a", "ServiceA", "http://127.0.0.1:1", &["find"]))
        .await
        .unwrap();
    orchestrator
        .register(registration("svc-b", "ServiceB", &service_b.uri(), &[]))
        .await
        .unwrap();

    let outcome = orchestrator.handle_request("will it rain tomorrow").await;
    assert_eq!(outcome, DispatchOutcome::success(Some("ServiceB"), json!("sunny")));

    database.close().await.unwrap();
}

#[tokio::test]
async fn test_none_reply_answers_directly() {
    let temp_dir = TempDir::new().unwrap();
    // Selection and direct answer share the endpoint; both get "none"
    let model = model_replying("none").await;

    let config = test_config(temp_dir.path(), &model.uri());
    let (orchestrator, database) = orchestrator(&config).await;

    orchestrator
        .register(registration("svc-b", "ServiceB", "http://127.0.0.1:1", &["weather"]))
        .await
        .unwrap();

    let outcome = orchestrator.handle_request("tell me a joke").await;
    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        json!({"service": null, "response": "none"})
    );

    database.close().await.unwrap();
}

#[tokio::test]
async fn test_model_down_yields_null_service_error() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), "http://127.0.0.1:1");
    let (orchestrator, database) = orchestrator(&config).await;

    let outcome = orchestrator.handle_request("tell me a joke").await;
    assert!(outcome.is_error());
    assert_eq!(outcome.service(), None);

    database.close().await.unwrap();
}

#[tokio::test]
async fn test_reregistering_same_id_keeps_one_record() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), "http://127.0.0.1:1");
    let (orchestrator, database) = orchestrator(&config).await;

    orchestrator
        .register(registration("svc-a", "finder", "http://svc/a", &[]))
        .await
        .unwrap();
    let receipt = orchestrator
        .register(registration("svc-a", "locator", "http://svc/b/", &[]))
        .await
        .unwrap();

    assert_eq!(receipt.status, "registered");
    assert_eq!(receipt.total_services, 1);
    assert_eq!(
        orchestrator.list_records().await.unwrap(),
        vec![ServiceRecord::new("svc-a", "locator", "http://svc/b")]
    );
    assert_eq!(orchestrator.list_services().await, vec!["locator"]);

    database.close().await.unwrap();
}

#[tokio::test]
async fn test_bootstrap_restores_registry_from_disk() {
    let temp_dir = TempDir::new().unwrap();
    let service = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "finder",
            "endpoint": service.uri(),
            "request_format": {"keywords": ["find"]}
        })))
        .mount(&service)
        .await;

    let config = test_config(temp_dir.path(), "http://127.0.0.1:1");

    // First run: register, then shut down
    {
        let (orchestrator, database) = orchestrator(&config).await;
        orchestrator
            .register(registration("svc-a", "finder", &service.uri(), &[]))
            .await
            .unwrap();
        orchestrator
            .register(registration("svc-down", "gone", "http://127.0.0.1:1", &[]))
            .await
            .unwrap();
        database.close().await.unwrap();
    }

    // Second run: the directory is rebuilt from the store plus live metadata
    let (orchestrator, database) = Orchestrator::bootstrap(&config).await.unwrap();

    assert_eq!(orchestrator.list_services().await, vec!["finder"]);
    assert_eq!(orchestrator.list_records().await.unwrap().len(), 2);
    let entry = orchestrator.directory().resolve("finder").await.unwrap();
    assert_eq!(entry.keywords(), ["find"]);

    database.close().await.unwrap();
}

#[tokio::test]
async fn test_bootstrap_registers_local_search() {
    let temp_dir = TempDir::new().unwrap();
    let records_path = temp_dir.path().join("records.json");
    std::fs::write(
        &records_path,
        r#"[{"uid": "A-1", "name": "Steel bolt M8"}, {"uid": "B-7", "name": "Copper wire"}]"#,
    )
    .unwrap();

    let toml = format!(
        r#"
[core]
data_dir = {:?}

[llm]
base_url = "http://127.0.0.1:1"

[search]
records_path = {:?}
service_name = "xlsx_search"
keywords = ["bolt", "wire"]
"#,
        temp_dir.path(),
        records_path
    );
    let config = Config::from_toml_str(&toml).unwrap();

    let (orchestrator, database) = Orchestrator::bootstrap(&config).await.unwrap();
    assert!(orchestrator.has_local_search());
    assert_eq!(orchestrator.list_services().await, vec!["xlsx_search"]);

    let outcome = orchestrator.handle_request("copper wire please").await;
    assert_eq!(
        outcome,
        DispatchOutcome::success(
            Some("xlsx_search"),
            json!([{"uid": "B-7", "name": "Copper wire"}])
        )
    );

    let results = orchestrator.local_search("steel bolt").await.unwrap();
    assert_eq!(results.len(), 1);

    database.close().await.unwrap();
}

#[tokio::test]
async fn test_internal_service_without_handler() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), "http://127.0.0.1:1");
    let (orchestrator, database) = orchestrator(&config).await;

    orchestrator
        .register(registration("local", "xlsx_search", "internal", &["sku"]))
        .await
        .unwrap();

    let outcome = orchestrator.handle_request("sku 1001").await;
    assert_eq!(
        outcome,
        DispatchOutcome::failure(Some("xlsx_search"), "Local service unavailable")
    );

    database.close().await.unwrap();
}
