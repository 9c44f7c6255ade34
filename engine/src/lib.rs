//! Switchboard Engine Library
//!
//! This library provides the core functionality of the Switchboard
//! orchestrator. It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Database persistence module
pub mod db;

/// In-memory service directory
pub mod directory;

/// Service invocation
pub mod dispatcher;

/// Language model client
pub mod llm;

/// Context handle tying the components together
pub mod orchestrator;

/// Live metadata reconciliation
pub mod reconciler;

/// Two-stage service selection
pub mod router;

/// Local search handlers
pub mod search;

/// Telemetry and observability
pub mod telemetry;

/// HTTP intake
pub mod api;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
