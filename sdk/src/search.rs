//! Local search collaborator
//!
//! Services registered with the `internal` endpoint marker are answered
//! in-process by whatever implements this trait. The engine never searches
//! on its own; it only forwards the query.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::EngineError;

/// In-process search handler for `internal` services
#[async_trait]
pub trait LocalSearch: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Return up to `limit` records matching `query`, best first
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Value>, EngineError>;
}
