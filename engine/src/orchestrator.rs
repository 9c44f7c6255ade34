//! Orchestrator
//!
//! The context handle built once at startup. It owns the service directory,
//! router, dispatcher and reconciler and is shared (behind an `Arc`) with
//! the HTTP intake and the CLI handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use sdk::errors::EngineError;
use sdk::types::{
    DispatchOutcome, RegistrationReceipt, ServiceDescriptor, ServiceRecord, ServiceRegistration,
};
use sdk::LocalSearch;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{Config, SearchConfig};
use crate::db::{Database, RegistryStore};
use crate::directory::ServiceDirectory;
use crate::dispatcher::Dispatcher;
use crate::llm::ollama::OllamaProvider;
use crate::llm::CompletionProvider;
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::router::ServiceRouter;
use crate::search;

/// Request orchestrator
pub struct Orchestrator {
    directory: Arc<ServiceDirectory>,
    router: ServiceRouter,
    dispatcher: Dispatcher,
    reconciler: Arc<Reconciler>,
}

impl Orchestrator {
    /// Wire an orchestrator from explicit collaborators
    pub fn new(
        config: &Config,
        store: Arc<dyn RegistryStore>,
        llm: Arc<dyn CompletionProvider>,
        local_search: Option<Arc<dyn LocalSearch>>,
    ) -> Self {
        Self {
            directory: Arc::new(ServiceDirectory::new(store)),
            router: ServiceRouter::new(Arc::clone(&llm)),
            dispatcher: Dispatcher::new(&config.dispatch, llm, local_search)
                .with_local_limit(config.search.top_k),
            reconciler: Arc::new(Reconciler::new(&config.registry)),
        }
    }

    /// Open the registry, build the Ollama client and local search, and
    /// bring the directory up to date
    ///
    /// The configured local search is registered as an in-process service.
    /// When `reconcile_on_startup` is set, one reconciliation pass runs
    /// before this returns. The database handle is returned so the caller
    /// can close it on shutdown.
    pub async fn bootstrap(config: &Config) -> Result<(Self, Database)> {
        let database = Database::new(&config.db_path())
            .await
            .context("Failed to open service registry")?;

        let llm: Arc<dyn CompletionProvider> = Arc::new(OllamaProvider::from_config(&config.llm));
        let local_search = search::from_config(&config.search)?;
        let has_local_search = local_search.is_some();

        let orchestrator = Self::new(config, Arc::new(database.services()), llm, local_search);

        if has_local_search {
            orchestrator
                .directory
                .register(local_service(&config.search))
                .await
                .context("Failed to register local search service")?;
        }

        if config.registry.reconcile_on_startup {
            orchestrator.reconcile().await?;
        }

        info!(
            services = orchestrator.directory.len().await,
            "Orchestrator ready"
        );
        Ok((orchestrator, database))
    }

    /// Register a service explicitly
    pub async fn register(
        &self,
        registration: ServiceRegistration,
    ) -> Result<RegistrationReceipt, EngineError> {
        let total = self.directory.register(registration.into_descriptor()).await?;
        Ok(RegistrationReceipt::registered(total))
    }

    /// Full persisted record set
    pub async fn list_records(&self) -> Result<Vec<ServiceRecord>, EngineError> {
        self.directory.records().await
    }

    /// Routable service names in directory order
    pub async fn list_services(&self) -> Vec<String> {
        self.directory.list().await
    }

    /// Route and dispatch one query
    ///
    /// Always produces an outcome; failures are embedded in it.
    pub async fn handle_request(&self, query: &str) -> DispatchOutcome {
        let catalog = self.directory.snapshot().await;
        let decision = self.router.route(query, &catalog).await;
        self.dispatcher
            .dispatch_named(decision.service(), query, &catalog)
            .await
    }

    /// Run one reconciliation pass
    pub async fn reconcile(&self) -> Result<ReconcileReport, EngineError> {
        let report = self.reconciler.reconcile(&self.directory).await?;
        if !report.skipped.is_empty() {
            warn!(
                "{} of {} services unavailable after reconciliation",
                report.skipped.len(),
                report.checked
            );
        }
        Ok(report)
    }

    /// Query the local search handler directly
    pub async fn local_search(&self, query: &str) -> Result<Vec<Value>, EngineError> {
        self.dispatcher.local_search(query).await
    }

    /// Whether a local search handler is configured
    pub fn has_local_search(&self) -> bool {
        self.dispatcher.has_local_search()
    }

    pub fn directory(&self) -> &Arc<ServiceDirectory> {
        &self.directory
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }
}

/// Directory entry for the configured in-process search service
fn local_service(config: &SearchConfig) -> ServiceDescriptor {
    ServiceDescriptor::new(
        config.service_id.as_str(),
        config.service_name.as_str(),
        &config.endpoint,
    )
    .with_description(config.description.as_str())
    .with_system_prompt(config.system_prompt.as_str())
    .with_keywords(config.keywords.iter().cloned())
}
