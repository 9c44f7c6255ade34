//! Dispatcher
//!
//! Invokes the service chosen by the router and normalizes the result.
//! Every path returns a `DispatchOutcome`; network failures, a missing
//! local handler and model failures are folded into `{service, error}`
//! rather than propagated.
//!
//! - `http(s)` endpoints: `POST {endpoint}{job_path}?request=..&limit=..`
//! - `internal` endpoints: the configured `LocalSearch`, never the network
//! - no service: the language model answers the query directly

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use sdk::errors::EngineError;
use sdk::types::{DispatchOutcome, EndpointKind, ServiceDescriptor};
use sdk::LocalSearch;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::directory::ServiceCatalog;
use crate::llm::CompletionProvider;

/// Service invoker
pub struct Dispatcher {
    client: Client,
    job_path: String,
    result_limit: usize,
    local_limit: usize,
    timeout: Duration,
    llm: Arc<dyn CompletionProvider>,
    local_search: Option<Arc<dyn LocalSearch>>,
}

impl Dispatcher {
    /// Create a dispatcher from the `[dispatch]` config section
    pub fn new(
        config: &DispatchConfig,
        llm: Arc<dyn CompletionProvider>,
        local_search: Option<Arc<dyn LocalSearch>>,
    ) -> Self {
        Self {
            client: Client::new(),
            job_path: config.job_path.clone(),
            result_limit: config.result_limit,
            local_limit: config.result_limit,
            timeout: config.timeout(),
            llm,
            local_search,
        }
    }

    /// Override how many records the local handler returns
    pub fn with_local_limit(mut self, limit: usize) -> Self {
        self.local_limit = limit;
        self
    }

    /// Full job URL for an http endpoint
    pub fn job_url(&self, endpoint: &str) -> String {
        format!("{}{}", sdk::normalize_endpoint(endpoint), self.job_path)
    }

    /// Invoke `service` with `query`
    pub async fn dispatch(&self, service: &ServiceDescriptor, query: &str) -> DispatchOutcome {
        let name = Some(service.name.as_str());

        let result = match service.kind() {
            EndpointKind::Http => self.call_http(&service.endpoint, query).await,
            EndpointKind::Internal => self.call_local(query).await,
            EndpointKind::Unsupported => {
                Err(EngineError::UnsupportedEndpoint(service.endpoint.clone()))
            }
        };

        match result {
            Ok(response) => DispatchOutcome::success(name, response),
            Err(e) => {
                warn!(service = %service.name, "Dispatch failed: {}", e);
                DispatchOutcome::failure(name, e)
            }
        }
    }

    /// Dispatch by directory name
    ///
    /// `None` means routing selected nothing and the model answers directly.
    pub async fn dispatch_named(
        &self,
        name: Option<&str>,
        query: &str,
        catalog: &ServiceCatalog,
    ) -> DispatchOutcome {
        let Some(name) = name else {
            return self.answer_directly(query).await;
        };

        match catalog.resolve(name) {
            Some(service) => self.dispatch(service, query).await,
            None => DispatchOutcome::failure(
                Some(name),
                EngineError::InvalidInput(format!("unknown service '{}'", name)),
            ),
        }
    }

    /// Answer the query with the language model; no service identity
    pub async fn answer_directly(&self, query: &str) -> DispatchOutcome {
        info!("No service selected, answering directly via {}", self.llm.name());
        match self.llm.complete(query).await {
            Ok(text) => DispatchOutcome::success(None, Value::String(text)),
            Err(e) => {
                warn!("Direct answer failed: {}", e);
                DispatchOutcome::failure(None, EngineError::from(e))
            }
        }
    }

    async fn call_http(&self, endpoint: &str, query: &str) -> Result<Value, EngineError> {
        let url = self.job_url(endpoint);
        debug!(url = %url, "Dispatching job");

        let limit = self.result_limit.to_string();
        let response = self
            .client
            .post(&url)
            .query(&[("request", query), ("limit", limit.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout(url.clone())
                } else {
                    EngineError::Network(format!("{}: {}", url, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Network(format!("{}: {}", url, e)))?;

        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    async fn call_local(&self, query: &str) -> Result<Value, EngineError> {
        let search = self
            .local_search
            .as_ref()
            .ok_or(EngineError::LocalHandlerUnavailable)?;

        debug!(handler = %search.name(), "Dispatching to local search");
        let results = search.search(query, self.local_limit).await?;
        Ok(Value::Array(results))
    }

    /// Whether a local search handler is configured
    pub fn has_local_search(&self) -> bool {
        self.local_search.is_some()
    }

    /// Run the local search handler directly
    pub async fn local_search(&self, query: &str) -> Result<Vec<Value>, EngineError> {
        let search = self
            .local_search
            .as_ref()
            .ok_or(EngineError::LocalHandlerUnavailable)?;
        search.search(query, self.local_limit).await
    }
}
