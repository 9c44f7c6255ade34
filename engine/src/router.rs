//! Service Router
//!
//! Decides which registered service should handle a query. Two stages,
//! each run at most once per request:
//!
//! 1. **Keyword fast path**: walk the directory in insertion order and pick
//!    the first service with any keyword occurring (case-insensitively) in
//!    the query. No scoring; first match wins.
//! 2. **Model-assisted fallback**: list every service to the language model
//!    and ask it to name exactly one, or `NONE`.
//!
//! When both stages decline, the caller answers the query directly with the
//! language model. That is a normal outcome, not an error.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::directory::ServiceCatalog;
use crate::llm::CompletionProvider;

/// Token the model is asked to reply with when nothing fits
pub const NO_SERVICE_TOKEN: &str = "NONE";

/// Outcome of routing one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Selected by the keyword fast path
    Keyword { service: String, keyword: String },
    /// Selected by the language model
    Model { service: String },
    /// Neither stage selected a service
    NoSelection,
}

impl RouteDecision {
    /// Name of the selected service, if any
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::Keyword { service, .. } | Self::Model { service } => Some(service),
            Self::NoSelection => None,
        }
    }
}

/// Two-stage service router
pub struct ServiceRouter {
    llm: Arc<dyn CompletionProvider>,
}

impl ServiceRouter {
    /// Create a new router using `llm` for the fallback stage
    pub fn new(llm: Arc<dyn CompletionProvider>) -> Self {
        Self { llm }
    }

    /// Route a query against a directory snapshot
    pub async fn route(&self, query: &str, catalog: &ServiceCatalog) -> RouteDecision {
        if let Some((service, keyword)) = match_keywords(query, catalog) {
            info!(service = %service, keyword = %keyword, "Keyword match");
            return RouteDecision::Keyword { service, keyword };
        }

        match self.select_with_model(query, catalog).await {
            Some(service) => {
                info!(service = %service, "Language model selected service");
                RouteDecision::Model { service }
            }
            None => {
                info!("No service selected");
                RouteDecision::NoSelection
            }
        }
    }

    /// Ask the language model to pick a service
    ///
    /// A failed completion call counts as "no selection".
    async fn select_with_model(&self, query: &str, catalog: &ServiceCatalog) -> Option<String> {
        if catalog.is_empty() {
            debug!("Directory empty, skipping model selection");
            return None;
        }

        let prompt = build_selection_prompt(query, catalog);
        match self.llm.complete(&prompt).await {
            Ok(reply) => {
                debug!(reply = %reply.trim(), "Model selection reply");
                parse_selection(&reply, catalog)
            }
            Err(e) => {
                warn!("Model selection failed via {}: {}", self.llm.name(), e);
                None
            }
        }
    }
}

/// Keyword fast path
///
/// Returns the first service (in directory order) with a keyword that occurs
/// in the query, together with that keyword. Keywords are tried in the order
/// the service declared them; empty keywords never match.
pub fn match_keywords(query: &str, catalog: &ServiceCatalog) -> Option<(String, String)> {
    let query_lower = query.to_lowercase();

    catalog.iter().find_map(|service| {
        service
            .keywords()
            .iter()
            .find(|kw| !kw.is_empty() && query_lower.contains(&kw.to_lowercase()))
            .map(|kw| (service.name.clone(), kw.clone()))
    })
}

/// Build the model selection prompt
///
/// Lists every service with its description and keywords, then the query,
/// then the reply instructions.
pub fn build_selection_prompt(query: &str, catalog: &ServiceCatalog) -> String {
    let lines: Vec<String> = catalog
        .iter()
        .map(|service| {
            format!(
                "- {}: {}. keywords: {}",
                service.name,
                service.description,
                service.keywords().join(", ")
            )
        })
        .collect();

    format!(
        "You are a request orchestrator. These services are available (name: description + keywords):\n\
         {}\n\n\
         User request:\n\
         {}\n\n\
         Reply with exactly one service name, spelled exactly as listed above, \
         that best fits the request. If no service fits, reply '{}'.",
        lines.join("\n"),
        query,
        NO_SERVICE_TOKEN
    )
}

/// Parse the model's selection reply
///
/// Any registered name occurring (case-insensitively) in the reply wins, in
/// directory order. Otherwise `NONE` or an unrecognised reply selects
/// nothing, and only an exact case-insensitive name match is accepted.
pub fn parse_selection(reply: &str, catalog: &ServiceCatalog) -> Option<String> {
    let reply = reply.trim();
    let reply_lower = reply.to_lowercase();

    if let Some(service) = catalog
        .iter()
        .find(|s| !s.name.is_empty() && reply_lower.contains(&s.name.to_lowercase()))
    {
        return Some(service.name.clone());
    }

    if reply.eq_ignore_ascii_case(NO_SERVICE_TOKEN) {
        return None;
    }

    catalog
        .iter()
        .find(|s| s.name.to_lowercase() == reply_lower)
        .map(|s| s.name.clone())
}
