//! JSON records search
//!
//! Loads an array of JSON objects and ranks them by how many query tokens
//! appear in their string fields. Ties keep file order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::LocalSearch;
use serde_json::Value;
use tracing::{debug, info};

/// Token-overlap search over a JSON records file
#[derive(Debug, Clone)]
pub struct RecordSearch {
    source: PathBuf,
    records: Vec<Value>,
    haystacks: Vec<String>,
}

impl RecordSearch {
    /// Load records from a JSON file holding an array of objects
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&contents).map_err(|e| {
            EngineError::Config(format!(
                "Failed to parse search records {}: {}",
                path.display(),
                e
            ))
        })?;

        let Value::Array(records) = value else {
            return Err(EngineError::Config(format!(
                "Search records {} must be a JSON array",
                path.display()
            )));
        };

        let search = Self::from_records(records).with_source(path);
        info!(
            "Loaded {} search records from {}",
            search.records.len(),
            path.display()
        );
        Ok(search)
    }

    /// Build a searcher over in-memory records
    pub fn from_records(records: Vec<Value>) -> Self {
        let haystacks = records.iter().map(haystack).collect();
        Self {
            source: PathBuf::new(),
            records,
            haystacks,
        }
    }

    fn with_source(mut self, path: &Path) -> Self {
        self.source = path.to_path_buf();
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Lower-cased concatenation of every string and number in a record
fn haystack(record: &Value) -> String {
    fn collect(value: &Value, out: &mut String) {
        match value {
            Value::String(s) => {
                out.push_str(&s.to_lowercase());
                out.push(' ');
            }
            Value::Number(n) => {
                out.push_str(&n.to_string());
                out.push(' ');
            }
            Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
            Value::Object(map) => map.values().for_each(|v| collect(v, out)),
            _ => {}
        }
    }

    let mut out = String::new();
    collect(record, &mut out);
    out
}

fn tokenize(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl LocalSearch for RecordSearch {
    fn name(&self) -> &str {
        "records"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Value>, EngineError> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, usize)> = self
            .haystacks
            .iter()
            .enumerate()
            .map(|(i, hay)| (i, tokens.iter().filter(|t| hay.contains(t.as_str())).count()))
            .filter(|&(_, score)| score > 0)
            .collect();

        // Stable sort keeps file order for equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        debug!(
            source = %self.source.display(),
            hits = scored.len(),
            "Record search for {:?}",
            query
        );

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(i, _)| self.records[i].clone())
            .collect())
    }
}
