/// Service registry persistence
///
/// Durable table of service records keyed by stable id. All queries are
/// parameterized; values are additionally stripped of quote and control
/// characters before they reach the table.
use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::ServiceRecord;
use sqlx::{Row, SqlitePool};
use std::time::{SystemTime, UNIX_EPOCH};

/// Durable store of service records
///
/// `put` is an idempotent upsert keyed by `id`. Writes are visible to the
/// next `get_all`; implementations must not cache.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Insert or overwrite the record for `id`
    async fn put(&self, id: &str, name: &str, endpoint: &str) -> Result<(), EngineError>;

    /// All persisted records in insertion order
    async fn get_all(&self) -> Result<Vec<ServiceRecord>, EngineError>;
}

/// Strip characters that could corrupt the storage layer
///
/// Removes quote characters, backticks and control characters, then trims.
pub fn sanitize_field(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | '`') && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Service repository for database operations
#[derive(Clone)]
pub struct ServiceRepository {
    pool: SqlitePool,
}

impl ServiceRepository {
    /// Create a new service repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a service record by id
    pub async fn get(&self, id: &str) -> Result<Option<ServiceRecord>, EngineError> {
        let row = sqlx::query("SELECT id, name, endpoint FROM services WHERE id = ?")
            .bind(sanitize_field(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| EngineError::Database(format!("Failed to fetch service: {}", e)))?;

        Ok(row.map(|row| ServiceRecord {
            id: row.get("id"),
            name: row.get("name"),
            endpoint: row.get("endpoint"),
        }))
    }

    /// Number of persisted records
    pub async fn count(&self) -> Result<i64, EngineError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM services")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| EngineError::Database(format!("Failed to count services: {}", e)))
    }
}

#[async_trait]
impl RegistryStore for ServiceRepository {
    async fn put(&self, id: &str, name: &str, endpoint: &str) -> Result<(), EngineError> {
        let id = sanitize_field(id);
        let name = sanitize_field(name);
        let endpoint = sanitize_field(endpoint);

        for (field, value) in [("id", &id), ("name", &name), ("endpoint", &endpoint)] {
            if value.is_empty() {
                return Err(EngineError::InvalidInput(format!(
                    "service {} must not be empty",
                    field
                )));
            }
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();

        sqlx::query(
            "INSERT INTO services (id, name, endpoint, created_at, updated_at) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, endpoint = excluded.endpoint, updated_at = excluded.updated_at",
        )
        .bind(&id)
        .bind(&name)
        .bind(&endpoint)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::Database(format!("Failed to store service {}: {}", id, e)))?;

        tracing::debug!(id = %id, name = %name, endpoint = %endpoint, "Stored service record");
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<ServiceRecord>, EngineError> {
        let rows = sqlx::query("SELECT id, name, endpoint FROM services ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::Database(format!("Failed to list services: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| ServiceRecord {
                id: row.get("id"),
                name: row.get("name"),
                endpoint: row.get("endpoint"),
            })
            .collect())
    }
}
