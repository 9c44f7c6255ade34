//! HTTP intake
//!
//! Routes:
//! - `POST /register_service`: register a service
//! - `GET  /services`: full persisted registry
//! - `POST /ask`: route and dispatch a prompt (always 200)
//! - `POST /internal/search`: query the local search handler
//! - `GET  /health`: liveness and directory size

use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sdk::errors::EngineError;
use sdk::types::{DispatchOutcome, RegistrationReceipt, ServiceRegistration, TaskRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::orchestrator::Orchestrator;

type AppState = Arc<Orchestrator>;

/// Error body returned by the intake
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match err {
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::LocalHandlerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Local search request body
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

/// Local search response body
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<Value>,
}

/// Build the intake router
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/register_service", post(register_service))
        .route("/services", get(list_services))
        .route("/ask", post(ask))
        .route("/internal/search", post(internal_search))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(orchestrator)
}

/// Serve the intake on `listener` until `shutdown` resolves
pub async fn serve<F>(
    listener: TcpListener,
    orchestrator: Arc<Orchestrator>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP intake stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

async fn register_service(
    State(orchestrator): State<AppState>,
    payload: Result<Json<ServiceRegistration>, JsonRejection>,
) -> Result<Json<RegistrationReceipt>, ApiError> {
    let Json(registration) = payload?;
    let receipt = orchestrator.register(registration).await?;
    Ok(Json(receipt))
}

async fn list_services(State(orchestrator): State<AppState>) -> Result<Json<Value>, ApiError> {
    let services = orchestrator.list_records().await?;
    Ok(Json(json!({ "services": services })))
}

async fn ask(
    State(orchestrator): State<AppState>,
    payload: Result<Json<TaskRequest>, JsonRejection>,
) -> Result<Json<DispatchOutcome>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(orchestrator.handle_request(&request.prompt).await))
}

async fn internal_search(
    State(orchestrator): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(request) = payload?;
    let results = orchestrator.local_search(&request.query).await?;
    Ok(Json(SearchResponse { results }))
}

async fn health(State(orchestrator): State<AppState>) -> Json<Value> {
    let services = orchestrator.directory().len().await;
    Json(json!({ "status": "ok", "services": services }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let err = ApiError::from(EngineError::InvalidInput("missing id".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = ApiError::from(EngineError::Database("locked".to_string()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::from(EngineError::LocalHandlerUnavailable);
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.message, "Local service unavailable");
    }
}
