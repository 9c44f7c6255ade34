//! Registry Reconciler
//!
//! Pulls each registered service's self-reported descriptor and brings the
//! registry store and the directory in line with it. The registry owns
//! identity (`id`); each service owns its own metadata.
//!
//! A service that cannot be reached, times out, or reports something that
//! is not a descriptor is logged and skipped: its stored record is left
//! untouched and it stays out of the directory until a later pass succeeds.
//! Nothing is ever deleted.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use sdk::errors::EngineError;
use sdk::types::{EndpointKind, RemoteDescriptor, ServiceDescriptor, ServiceRecord};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::db::sanitize_field;
use crate::directory::ServiceDirectory;

/// A record left out of the directory on this pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedService {
    pub id: String,
    pub reason: String,
}

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Stored records examined
    pub checked: usize,
    /// Records whose live descriptor was applied to the directory
    pub refreshed: usize,
    /// Records rewritten in the store because live metadata drifted
    pub updated: usize,
    /// Records skipped this pass
    pub skipped: Vec<SkippedService>,
}

/// Pull-based registry synchronizer
pub struct Reconciler {
    client: Client,
    fetch_timeout: Duration,
    budget: Duration,
    max_concurrent: usize,
}

impl Reconciler {
    /// Create a reconciler from the `[registry]` config section
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            client: Client::new(),
            fetch_timeout: config.fetch_timeout(),
            budget: config.startup_budget(),
            max_concurrent: config.max_concurrent_fetches.max(1),
        }
    }

    /// Run one reconciliation pass
    ///
    /// Fetches run concurrently, but results are applied in stored order so
    /// the directory's fast-path precedence stays deterministic. Only a
    /// failure to read the store itself is returned as an error.
    pub async fn reconcile(
        &self,
        directory: &ServiceDirectory,
    ) -> Result<ReconcileReport, EngineError> {
        let records = directory.store().get_all().await?;
        let mut report = ReconcileReport {
            checked: records.len(),
            ..Default::default()
        };

        info!("Reconciling {} registered services", records.len());

        let deadline = Instant::now() + self.budget;
        let fetched: Vec<(ServiceRecord, Result<RemoteDescriptor, EngineError>)> =
            stream::iter(records)
                .map(|record| async move {
                    let result = match EndpointKind::classify(&record.endpoint) {
                        EndpointKind::Http => {
                            match tokio::time::timeout_at(
                                deadline,
                                self.fetch_descriptor(&record.endpoint),
                            )
                            .await
                            {
                                Ok(result) => result,
                                Err(_) => Err(EngineError::Timeout(
                                    "reconciliation budget exhausted".to_string(),
                                )),
                            }
                        }
                        EndpointKind::Internal => Err(EngineError::UnsupportedEndpoint(
                            "internal services have no remote descriptor".to_string(),
                        )),
                        EndpointKind::Unsupported => {
                            Err(EngineError::UnsupportedEndpoint(record.endpoint.clone()))
                        }
                    };
                    (record, result)
                })
                .buffered(self.max_concurrent)
                .collect()
                .await;

        for (record, result) in fetched {
            let remote = match result {
                Ok(remote) => remote,
                Err(e) => {
                    if EndpointKind::classify(&record.endpoint) == EndpointKind::Internal {
                        debug!(id = %record.id, "Skipping internal service");
                    } else {
                        warn!(
                            id = %record.id,
                            endpoint = %record.endpoint,
                            "Skipping service this pass: {}",
                            e
                        );
                    }
                    report.skipped.push(SkippedService {
                        id: record.id,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let descriptor = remote.into_descriptor(record.id.clone());
            let live_name = sanitize_field(&descriptor.name);
            let live_endpoint = sanitize_field(&descriptor.endpoint);
            let drifted = live_name != record.name || live_endpoint != record.endpoint;

            let change = drifted.then_some((live_name.as_str(), live_endpoint.as_str()));
            if let Err(e) = directory.apply_reconciled(descriptor, change).await {
                warn!(id = %record.id, "Failed to apply reconciled metadata: {}", e);
                report.skipped.push(SkippedService {
                    id: record.id,
                    reason: e.to_string(),
                });
                continue;
            }

            if drifted {
                info!(
                    id = %record.id,
                    from = %record.name,
                    to = %live_name,
                    "Stored service metadata updated"
                );
                report.updated += 1;
            }
            report.refreshed += 1;
        }

        info!(
            refreshed = report.refreshed,
            updated = report.updated,
            skipped = report.skipped.len(),
            "Reconciliation finished"
        );
        Ok(report)
    }

    /// Fetch and validate a service's root descriptor
    pub async fn fetch_descriptor(&self, endpoint: &str) -> Result<RemoteDescriptor, EngineError> {
        let url = format!("{}/", sdk::normalize_endpoint(endpoint));

        let response = self
            .client
            .get(&url)
            .timeout(self.fetch_timeout)
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
            .bytes()
            .await
            .map_err(|e| EngineError::Network(format!("{}: {}", url, e)))?;

        parse_descriptor(&body)
    }

    /// Run a pass every `interval` until `shutdown` flips to true
    pub fn spawn_periodic(
        self: Arc<Self>,
        directory: Arc<ServiceDirectory>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; startup already reconciled
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.reconcile(&directory).await {
                            warn!("Periodic reconciliation failed: {}", e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            debug!("Periodic reconciliation stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}

/// Validate a descriptor payload
///
/// Must be a JSON object with non-empty string `name` and `endpoint`;
/// `request_format.keywords`, when present, must be a list of strings.
pub fn parse_descriptor(body: &[u8]) -> Result<RemoteDescriptor, EngineError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| EngineError::MalformedMetadata(format!("not JSON: {}", e)))?;

    if !value.is_object() {
        return Err(EngineError::MalformedMetadata(
            "descriptor is not an object".to_string(),
        ));
    }

    let descriptor: RemoteDescriptor = serde_json::from_value(value)
        .map_err(|e| EngineError::MalformedMetadata(e.to_string()))?;

    if descriptor.name.trim().is_empty() {
        return Err(EngineError::MalformedMetadata("empty name".to_string()));
    }
    if descriptor.endpoint.trim().is_empty() {
        return Err(EngineError::MalformedMetadata("empty endpoint".to_string()));
    }

    Ok(descriptor)
}

/// Turn a validated remote descriptor into a directory entry
pub fn to_directory_entry(id: &str, remote: RemoteDescriptor) -> ServiceDescriptor {
    remote.into_descriptor(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptor_full() {
        let body = br#"{
            "name": "finder",
            "endpoint": "http://svc/a/",
            "description": "Finds things",
            "request_format": {"keywords": ["find", "id"]}
        }"#;

        let descriptor = parse_descriptor(body).unwrap();
        let entry = to_directory_entry("svc-1", descriptor);
        assert_eq!(entry.id, "svc-1");
        assert_eq!(entry.endpoint, "http://svc/a");
        assert_eq!(entry.keywords(), ["find", "id"]);
        assert!(entry.system_prompt.is_empty());
    }

    #[test]
    fn test_parse_descriptor_rejects_non_object() {
        let err = parse_descriptor(br#"["finder"]"#).unwrap_err();
        assert!(matches!(err, EngineError::MalformedMetadata(_)));
    }

    #[test]
    fn test_parse_descriptor_rejects_html() {
        let err = parse_descriptor(b"<html>hello</html>").unwrap_err();
        assert!(matches!(err, EngineError::MalformedMetadata(_)));
    }

    #[test]
    fn test_parse_descriptor_requires_name() {
        let err = parse_descriptor(br#"{"endpoint": "http://svc"}"#).unwrap_err();
        assert!(matches!(err, EngineError::MalformedMetadata(_)));

        let err = parse_descriptor(br#"{"name": " ", "endpoint": "http://svc"}"#).unwrap_err();
        assert!(matches!(err, EngineError::MalformedMetadata(_)));
    }

    #[test]
    fn test_parse_descriptor_rejects_bad_keywords() {
        let body = br#"{"name": "f", "endpoint": "http://svc", "request_format": {"keywords": "find"}}"#;
        let err = parse_descriptor(body).unwrap_err();
        assert!(matches!(err, EngineError::MalformedMetadata(_)));
    }
}
