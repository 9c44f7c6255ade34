//! Language Model Completion Layer
//!
//! The router and dispatcher only ever need one thing from a language
//! model: turn a prompt into text. The `CompletionProvider` trait is that
//! seam; `ollama::OllamaProvider` is the production implementation.

use async_trait::async_trait;

pub mod ollama;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LLMError> for sdk::EngineError {
    fn from(err: LLMError) -> Self {
        sdk::EngineError::LLMProvider(err.to_string())
    }
}

/// Text completion provider
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "ollama")
    fn name(&self) -> &str;

    /// Complete a single user prompt
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is currently healthy and available
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Pull the assistant text out of a completion payload
///
/// Understands OpenAI-style `choices[0].message.content` (or `.text`) and
/// Ollama-style `response` / `message.content`.
pub fn extract_completion_text(value: &serde_json::Value) -> Option<String> {
    if let Some(choice) = value.get("choices").and_then(|c| c.get(0)) {
        if let Some(content) = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
        {
            return Some(content.to_string());
        }
        if let Some(text) = choice.get("text").and_then(|t| t.as_str()) {
            return Some(text.to_string());
        }
    }

    if let Some(response) = value.get("response").and_then(|r| r.as_str()) {
        return Some(response.to_string());
    }

    value
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_chat_completion() {
        let value = json!({"choices": [{"message": {"role": "assistant", "content": "hi"}}]});
        assert_eq!(extract_completion_text(&value).as_deref(), Some("hi"));
    }

    #[test]
    fn test_extract_generate_response() {
        let value = json!({"model": "m", "response": "answer", "done": true});
        assert_eq!(extract_completion_text(&value).as_deref(), Some("answer"));
    }

    #[test]
    fn test_extract_ollama_chat_message() {
        let value = json!({"message": {"role": "assistant", "content": "native"}});
        assert_eq!(extract_completion_text(&value).as_deref(), Some("native"));
    }

    #[test]
    fn test_extract_unknown_shape() {
        assert!(extract_completion_text(&json!({"foo": 1})).is_none());
        assert!(extract_completion_text(&json!("plain")).is_none());
    }

    #[test]
    fn test_llm_error_converts_to_engine_error() {
        let err: sdk::EngineError = LLMError::Timeout.into();
        assert!(matches!(err, sdk::EngineError::LLMProvider(_)));
    }
}
