//! Ollama LLM Provider
//!
//! This module implements the CompletionProvider trait for Ollama, a local LLM
//! provider, typically at http://localhost:11434.
//!
//! Key features:
//! - OpenAI-compatible chat endpoint first (`/v1/chat/completions`)
//! - Native generate endpoint as fallback (`/api/generate`)
//! - Tolerates JSON, newline-delimited JSON and plain text replies

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use std::time::Duration;

use super::{extract_completion_text, CompletionProvider, LLMError, Result};
use crate::config::LLMConfig;

/// Ollama provider configuration
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    /// Base URL for Ollama API (typically http://localhost:11434)
    base_url: String,

    /// Model name to use (e.g., "mistral-small:latest")
    model: String,

    chat_timeout: Duration,
    generate_timeout: Duration,

    /// HTTP client for API requests
    client: Client,
}

impl OllamaProvider {
    /// Create a new Ollama provider with default timeouts
    ///
    /// # Arguments
    /// * `base_url` - Base URL for Ollama API (e.g., "http://localhost:11434")
    /// * `model` - Model name to use (e.g., "mistral-small:latest")
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let defaults = LLMConfig::default();
        Self {
            base_url: sdk::normalize_endpoint(&base_url.into()),
            model: model.into(),
            chat_timeout: defaults.chat_timeout(),
            generate_timeout: defaults.generate_timeout(),
            client: Client::new(),
        }
    }

    /// Create a provider from the `[llm]` config section
    pub fn from_config(config: &LLMConfig) -> Self {
        Self::new(config.base_url.clone(), config.model.clone())
            .with_timeouts(config.chat_timeout(), config.generate_timeout())
    }

    /// Override the chat and generate timeouts
    pub fn with_timeouts(mut self, chat: Duration, generate: Duration) -> Self {
        self.chat_timeout = chat;
        self.generate_timeout = generate;
        self
    }

    /// Chat completion against the OpenAI-compatible endpoint
    async fn chat(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.chat_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let body = Self::checked_body(response).await?;

        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(value) => extract_completion_text(&value).ok_or_else(|| {
                LLMError::ParseError("chat reply has no choices[0].message.content".to_string())
            }),
            Err(_) => Ok(body),
        }
    }

    /// Plain generation against the native endpoint
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.generate_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let body = Self::checked_body(response).await?;
        Ok(parse_generate_body(&body))
    }

    async fn checked_body(response: Response) -> Result<String> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::ProviderUnavailable(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        response
            .text()
            .await
            .map_err(|e| LLMError::NetworkError(format!("Failed to read Ollama reply: {}", e)))
    }

    fn map_send_error(&self, e: reqwest::Error) -> LLMError {
        if e.is_timeout() {
            LLMError::Timeout
        } else if e.is_connect() {
            LLMError::ProviderUnavailable(format!(
                "Cannot connect to Ollama at {}. Is Ollama running?",
                self.base_url
            ))
        } else {
            LLMError::NetworkError(e.to_string())
        }
    }
}

/// Interpret a generate reply
///
/// A single JSON document yields its completion text (or the document
/// itself when it has none). Streamed newline-delimited chunks are joined.
/// Anything else is returned verbatim.
fn parse_generate_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        return match extract_completion_text(&value) {
            Some(text) => text,
            None => match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            },
        };
    }

    let chunks: Vec<serde_json::Value> = body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map_while(|line| serde_json::from_str(line).ok())
        .collect();

    let streamed = chunks.len() == body.lines().filter(|l| !l.trim().is_empty()).count();
    if streamed && !chunks.is_empty() {
        return chunks
            .iter()
            .filter_map(|chunk| chunk.get("response").and_then(|r| r.as_str()))
            .collect();
    }

    body.to_string()
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::debug!(
            "Ollama request: model={}, prompt_chars={}",
            self.model,
            prompt.len()
        );

        let start = std::time::Instant::now();
        match self.chat(prompt).await {
            Ok(text) => {
                tracing::info!(
                    "Ollama chat response received in {:.1}s",
                    start.elapsed().as_secs_f64()
                );
                Ok(text)
            }
            Err(e) => {
                tracing::warn!("Ollama chat endpoint failed ({}), trying generate", e);
                let text = self.generate(prompt).await?;
                tracing::info!(
                    "Ollama generate response received in {:.1}s",
                    start.elapsed().as_secs_f64()
                );
                Ok(text)
            }
        }
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// OpenAI-compatible chat request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Native generate request
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}
