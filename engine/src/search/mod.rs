//! Local search handlers
//!
//! Implementations of `sdk::LocalSearch` that back `internal` services.

use std::sync::Arc;

use sdk::errors::EngineError;
use sdk::LocalSearch;

use crate::config::SearchConfig;

pub mod records;

pub use records::RecordSearch;

/// Build the configured local search handler, if any
pub fn from_config(config: &SearchConfig) -> Result<Option<Arc<dyn LocalSearch>>, EngineError> {
    match &config.records_path {
        Some(path) => {
            let search = RecordSearch::load(path)?;
            Ok(Some(Arc::new(search)))
        }
        None => Ok(None),
    }
}
