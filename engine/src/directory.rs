//! Service Directory
//!
//! In-memory, name-keyed view of the services that can currently be routed
//! to. Entries live in an ordered sequence with a name-to-index lookup, so
//! the fast-path precedence (first registered wins) is explicit rather than
//! a property of some map's iteration order.
//!
//! The directory is a cache. The registry store is the source of truth and
//! the directory may be rebuilt from it (plus reconciliation) at any time.

use std::collections::HashMap;
use std::sync::Arc;

use sdk::errors::EngineError;
use sdk::types::{ServiceDescriptor, ServiceRecord};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::db::RegistryStore;

/// Ordered collection of routable services
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    entries: Vec<ServiceDescriptor>,
    index: HashMap<String, usize>,
}

impl ServiceCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry by name
    ///
    /// An existing entry keeps its position. If the same `id` was previously
    /// listed under another name, that stale entry is dropped. A different
    /// service already holding this name is overwritten (last write wins).
    pub fn upsert(&mut self, descriptor: ServiceDescriptor) {
        let by_name = self.index.get(&descriptor.name).copied();
        let by_id = self
            .entries
            .iter()
            .position(|e| e.id == descriptor.id && e.name != descriptor.name);

        if let Some(slot) = by_name {
            if self.entries[slot].id != descriptor.id {
                warn!(
                    name = %descriptor.name,
                    previous_id = %self.entries[slot].id,
                    id = %descriptor.id,
                    "Service name collision, overwriting directory entry"
                );
            }
        }

        match (by_name, by_id) {
            (Some(slot), None) => self.entries[slot] = descriptor,
            (None, Some(stale)) => {
                self.index.remove(&self.entries[stale].name);
                self.index.insert(descriptor.name.clone(), stale);
                self.entries[stale] = descriptor;
            }
            (Some(slot), Some(stale)) => {
                self.entries[slot] = descriptor;
                self.entries.remove(stale);
                self.reindex();
            }
            (None, None) => {
                self.index
                    .insert(descriptor.name.clone(), self.entries.len());
                self.entries.push(descriptor);
            }
        }
    }

    /// Look up an entry by name
    pub fn resolve(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Names in insertion order
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
    }
}

/// Shared directory handle
///
/// Mutations hold the write lock across the store write, so registration
/// and reconciliation updates are serialized against each other and against
/// readers.
pub struct ServiceDirectory {
    catalog: RwLock<ServiceCatalog>,
    store: Arc<dyn RegistryStore>,
}

impl ServiceDirectory {
    /// Create an empty directory backed by `store`
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            catalog: RwLock::new(ServiceCatalog::new()),
            store,
        }
    }

    /// Register a service explicitly
    ///
    /// Persists `(id, name, endpoint)` first; the in-memory entry is only
    /// updated once the store accepted the write. Returns the directory size.
    pub async fn register(&self, descriptor: ServiceDescriptor) -> Result<usize, EngineError> {
        if descriptor.id.is_empty() || descriptor.name.is_empty() || descriptor.endpoint.is_empty()
        {
            return Err(EngineError::InvalidInput(
                "id, name and endpoint are required".to_string(),
            ));
        }

        let mut catalog = self.catalog.write().await;
        self.store
            .put(&descriptor.id, &descriptor.name, &descriptor.endpoint)
            .await?;

        info!(name = %descriptor.name, id = %descriptor.id, "Service registered");
        catalog.upsert(descriptor);
        Ok(catalog.len())
    }

    /// Apply reconciled metadata
    ///
    /// `stored_change` carries the `(name, endpoint)` to persist when the
    /// live values drifted from the stored record.
    pub(crate) async fn apply_reconciled(
        &self,
        descriptor: ServiceDescriptor,
        stored_change: Option<(&str, &str)>,
    ) -> Result<(), EngineError> {
        let mut catalog = self.catalog.write().await;
        if let Some((name, endpoint)) = stored_change {
            self.store.put(&descriptor.id, name, endpoint).await?;
        }
        catalog.upsert(descriptor);
        Ok(())
    }

    /// Names in insertion order
    pub async fn list(&self) -> Vec<String> {
        self.catalog.read().await.names()
    }

    /// Look up an entry by name
    pub async fn resolve(&self, name: &str) -> Option<ServiceDescriptor> {
        self.catalog.read().await.resolve(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.catalog.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.catalog.read().await.is_empty()
    }

    /// Point-in-time copy for routing without holding the lock
    pub async fn snapshot(&self) -> ServiceCatalog {
        self.catalog.read().await.clone()
    }

    /// Full persisted record set
    pub async fn records(&self) -> Result<Vec<ServiceRecord>, EngineError> {
        self.store.get_all().await
    }

    pub(crate) fn store(&self) -> &Arc<dyn RegistryStore> {
        &self.store
    }
}
