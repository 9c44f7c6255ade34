//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - serve: Run the HTTP intake
//! - ask: Route and dispatch one query
//! - services: Show the persisted registry
//! - register: Persist a service
//! - reconcile: Refresh stored metadata from live descriptors

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use sdk::types::{RegistrationReceipt, RequestFormat, ServiceRegistration};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::api;
use crate::config::Config;
use crate::db::{Database, RegistryStore};
use crate::directory::ServiceDirectory;
use crate::orchestrator::Orchestrator;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Run the HTTP intake until Ctrl-C
///
/// Bootstraps the orchestrator (including the startup reconciliation pass),
/// starts periodic reconciliation when configured, and flushes the registry
/// on the way out.
pub async fn handle_serve(
    config: &Config,
    host: Option<String>,
    port: Option<u16>,
    format: OutputFormat,
) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", host, port))?;

    let (orchestrator, database) = Orchestrator::bootstrap(config).await?;
    let orchestrator = Arc::new(orchestrator);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let periodic = config.registry.reconcile_interval().map(|interval| {
        tracing::info!("Periodic reconciliation every {:?}", interval);
        Arc::clone(orchestrator.reconciler()).spawn_periodic(
            Arc::clone(orchestrator.directory()),
            interval,
            shutdown_rx,
        )
    });

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    match format {
        OutputFormat::Text => {
            println!("Switchboard listening on http://{}", listener.local_addr()?);
            println!("  Services: {}", orchestrator.list_services().await.join(", "));
        }
        OutputFormat::Json => {
            let output = json!({
                "status": "listening",
                "address": listener.local_addr()?.to_string(),
                "services": orchestrator.list_services().await,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    let served = api::serve(listener, orchestrator, api::shutdown_signal()).await;

    shutdown_tx.send(true).ok();
    if let Some(handle) = periodic {
        handle.await.ok();
    }
    database.close().await?;

    served
}

/// Route and dispatch a single query
pub async fn handle_ask(prompt: String, config: &Config, format: OutputFormat) -> Result<()> {
    let (orchestrator, database) = Orchestrator::bootstrap(config).await?;
    let outcome = orchestrator.handle_request(&prompt).await;
    database.close().await?;

    match format {
        OutputFormat::Text => {
            let service = outcome.service().unwrap_or("none");
            match &outcome {
                sdk::DispatchOutcome::Success { response, .. } => {
                    println!("Service: {}", service);
                    println!();
                    match response.as_str() {
                        Some(text) => println!("{}", text),
                        None => println!("{}", serde_json::to_string_pretty(response)?),
                    }
                }
                sdk::DispatchOutcome::Failure { error, .. } => {
                    println!("✗ Dispatch to {} failed: {}", service, error);
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}

/// Show the persisted registry
pub async fn handle_services(config: &Config, format: OutputFormat) -> Result<()> {
    let database = Database::new(&config.db_path())
        .await
        .context("Failed to open service registry")?;

    let records = database
        .services()
        .get_all()
        .await
        .context("Failed to read service registry")?;
    database.close().await?;

    match format {
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No services registered");
                return Ok(());
            }

            println!("Registered services ({}):", records.len());
            println!();
            for record in records {
                println!("  {} ({})", record.name, record.id);
                println!("    Endpoint: {}", record.endpoint);
            }
        }
        OutputFormat::Json => {
            let output = json!({ "services": records });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Persist a service from the command line
///
/// Only the durable record is written; its live metadata is picked up by
/// the next reconciliation pass.
pub async fn handle_register(
    registration: ServiceRegistration,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let database = Database::new(&config.db_path())
        .await
        .context("Failed to open service registry")?;
    let repository = database.services();

    let directory = ServiceDirectory::new(Arc::new(repository.clone()));
    let descriptor = registration.into_descriptor();
    let name = descriptor.name.clone();
    directory.register(descriptor).await?;

    let total = repository.count().await?;
    database.close().await?;

    let receipt = RegistrationReceipt::registered(usize::try_from(total).unwrap_or_default());
    match format {
        OutputFormat::Text => {
            println!("✓ Registered {}", name);
            println!("  Total services: {}", receipt.total_services);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
    }

    Ok(())
}

/// Build a registration from CLI arguments
pub fn registration_from_args(
    id: String,
    name: String,
    endpoint: String,
    description: Option<String>,
    system_prompt: Option<String>,
    keywords: Vec<String>,
) -> ServiceRegistration {
    ServiceRegistration {
        id,
        name,
        description,
        system_prompt,
        request_format: (!keywords.is_empty()).then(|| RequestFormat::with_keywords(keywords)),
        endpoint,
    }
}

/// Run one reconciliation pass and print its report
pub async fn handle_reconcile(config: &Config, format: OutputFormat) -> Result<()> {
    let mut config = config.clone();
    config.registry.reconcile_on_startup = false;

    let (orchestrator, database) = Orchestrator::bootstrap(&config).await?;
    let report = orchestrator.reconcile().await?;
    let services = orchestrator.list_services().await;
    database.close().await?;

    match format {
        OutputFormat::Text => {
            println!("Reconciliation complete");
            println!("  Checked:   {}", report.checked);
            println!("  Refreshed: {}", report.refreshed);
            println!("  Updated:   {}", report.updated);
            println!("  Skipped:   {}", report.skipped.len());
            for skipped in &report.skipped {
                println!("    {}: {}", skipped.id, skipped.reason);
            }
            println!();
            println!("Routable services: {}", services.join(", "));
        }
        OutputFormat::Json => {
            let output = json!({
                "report": report,
                "services": services,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_from_args() {
        let registration = registration_from_args(
            "svc-a".to_string(),
            "finder".to_string(),
            "http://svc/a/".to_string(),
            None,
            None,
            vec!["find".to_string()],
        );

        let descriptor = registration.into_descriptor();
        assert_eq!(descriptor.endpoint, "http://svc/a");
        assert_eq!(descriptor.keywords(), ["find"]);
    }

    #[test]
    fn test_registration_without_keywords() {
        let registration = registration_from_args(
            "svc-a".to_string(),
            "finder".to_string(),
            "internal".to_string(),
            Some("Lookup".to_string()),
            None,
            Vec::new(),
        );

        assert!(registration.request_format.is_none());
        assert_eq!(registration.description.as_deref(), Some("Lookup"));
    }
}
