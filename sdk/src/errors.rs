//! Error types and handling
//!
//! This module provides the error types used throughout Switchboard.
//! All errors implement the `SwitchboardErrorExt` trait which provides
//! user-friendly hints and indicates whether errors are recoverable.
//!
//! Dispatch and reconciliation never let these escape to the caller:
//! the dispatcher folds them into an error result and the reconciler
//! logs them and skips the affected record.

use thiserror::Error;

/// Trait for Switchboard error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information.
pub trait SwitchboardErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// endpoints, queries or other request data.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried on a later request or a later
    /// reconciliation pass. Non-recoverable errors need an operator.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Database**: Registry store failures
/// - **Network**: Unreachable services, timeouts, non-2xx replies
/// - **Metadata**: Remote descriptors that do not have the expected shape
/// - **Local handler**: Internal dispatch without a configured search engine
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, SwitchboardErrorExt};
///
/// let error = EngineError::Timeout("http://svc/a/makejob".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal = EngineError::Config("bad log level".to_string());
/// assert!(!fatal.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Registry store errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    // Reconciliation errors
    #[error("Malformed service metadata: {0}")]
    MalformedMetadata(String),

    // Dispatch errors
    #[error("Local service unavailable")]
    LocalHandlerUnavailable,

    #[error("Unsupported endpoint: {0}")]
    UnsupportedEndpoint(String),

    // Language model errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether this error is a network-level failure (unreachable, timeout, non-2xx)
    pub fn is_network_failure(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::HttpStatus { .. }
        )
    }
}

impl SwitchboardErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Database(_) => "Registry storage failed. Check the data directory",
            Self::InvalidInput(_) => "The request is missing a required field",
            Self::Network(_) => "The service could not be reached. Check that it is running",
            Self::Timeout(_) => "The service took too long to respond. Try again",
            Self::HttpStatus { .. } => "The service rejected the request",
            Self::MalformedMetadata(_) => "The service reported an invalid descriptor",
            Self::LocalHandlerUnavailable => "Local search is not configured",
            Self::UnsupportedEndpoint(_) => "The service endpoint must be http(s) or internal",
            Self::LLMProvider(_) => "Language model unavailable. Check the llm section",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) | Self::LocalHandlerUnavailable | Self::UnsupportedEndpoint(_) => {
                false
            }
            _ => true,
        }
    }
}
