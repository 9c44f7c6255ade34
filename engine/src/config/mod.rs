//! Configuration management
//!
//! This module handles loading, validation, and management of the Switchboard
//! configuration. Configuration is stored in TOML format at
//! ~/.switchboard/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **server**: Intake bind address
//! - **llm**: Language model endpoint, model and timeouts
//! - **registry**: Reconciliation policy
//! - **dispatch**: Downstream job call parameters
//! - **search**: Optional local search handler (optional)
//!
//! # Examples
//!
//! ```no_run
//! use switchboard_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Model: {}", config.llm.model);
//! println!("Registry: {:?}", config.db_path());
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use sdk::types::INTERNAL_ENDPOINT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// HTTP intake settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Language model settings
    #[serde(default)]
    pub llm: LLMConfig,

    /// Reconciliation settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Downstream dispatch settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Local search handler (optional)
    #[serde(default)]
    pub search: SearchConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// HTTP intake configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Base URL of the Ollama-compatible server
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Timeout for the chat completion call (seconds)
    #[serde(default = "default_chat_timeout")]
    pub chat_timeout_secs: u64,

    /// Timeout for the fallback generate call (seconds)
    #[serde(default = "default_generate_timeout")]
    pub generate_timeout_secs: u64,
}

/// Reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Run a reconciliation pass when the engine starts
    #[serde(default = "default_true")]
    pub reconcile_on_startup: bool,

    /// Seconds between background passes; 0 disables them
    #[serde(default)]
    pub reconcile_interval_secs: u64,

    /// Per-service descriptor fetch timeout (seconds)
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Overall budget for one pass (seconds)
    #[serde(default = "default_startup_budget")]
    pub startup_budget_secs: u64,

    /// Upper bound on in-flight descriptor fetches
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

/// Downstream dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Sub-path appended to http endpoints
    #[serde(default = "default_job_path")]
    pub job_path: String,

    /// Value sent as the `limit` query parameter
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,

    /// Dispatch call timeout (seconds)
    #[serde(default = "default_dispatch_timeout")]
    pub timeout_secs: u64,
}

/// Local search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// JSON records file; no local handler when unset (supports ~ expansion)
    #[serde(default)]
    pub records_path: Option<PathBuf>,

    /// Records returned per query
    #[serde(default = "default_result_limit")]
    pub top_k: usize,

    /// Registry id for the in-process service
    #[serde(default = "default_search_service_id")]
    pub service_id: String,

    /// Routable name for the in-process service
    #[serde(default = "default_search_service_name")]
    pub service_name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub system_prompt: String,

    /// Fast-path keywords for the in-process service
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default = "default_internal_endpoint")]
    pub endpoint: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            chat_timeout_secs: default_chat_timeout(),
            generate_timeout_secs: default_generate_timeout(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reconcile_on_startup: true,
            reconcile_interval_secs: 0,
            fetch_timeout_secs: default_fetch_timeout(),
            startup_budget_secs: default_startup_budget(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            job_path: default_job_path(),
            result_limit: default_result_limit(),
            timeout_secs: default_dispatch_timeout(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            records_path: None,
            top_k: default_result_limit(),
            service_id: default_search_service_id(),
            service_name: default_search_service_name(),
            description: String::new(),
            system_prompt: String::new(),
            keywords: Vec::new(),
            endpoint: default_internal_endpoint(),
        }
    }
}

impl LLMConfig {
    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_secs)
    }
}

impl RegistryConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn startup_budget(&self) -> Duration {
        Duration::from_secs(self.startup_budget_secs)
    }

    /// Interval for background passes, if enabled
    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0)
            .then(|| Duration::from_secs(self.reconcile_interval_secs))
    }
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.switchboard")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_llm_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "mistral-small:latest".to_string()
}

fn default_chat_timeout() -> u64 {
    30
}

fn default_generate_timeout() -> u64 {
    60
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_startup_budget() -> u64 {
    30
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_job_path() -> String {
    "/makejob".to_string()
}

fn default_result_limit() -> usize {
    5
}

fn default_dispatch_timeout() -> u64 {
    10
}

fn default_search_service_id() -> String {
    "local-search".to_string()
}

fn default_search_service_name() -> String {
    "local_search".to_string()
}

fn default_internal_endpoint() -> String {
    INTERNAL_ENDPOINT.to_string()
}

impl Config {
    /// Load configuration from the default location (~/.switchboard/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse, validate and process configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        // Written before processing so ~ stays unexpanded on disk
        let defaults = Self::default();
        let toml_string = toml::to_string_pretty(&defaults)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = defaults;
        config.validate_and_process()?;
        Ok(config)
    }

    /// Get the default configuration file path (~/.switchboard/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".switchboard").join("config.toml"))
    }

    /// Path of the registry database inside the data directory
    pub fn db_path(&self) -> PathBuf {
        self.core.data_dir.join("registry.db")
    }

    /// Validate and process configuration
    ///
    /// Checks value ranges and expands ~ in the data directory and search
    /// records path. The data directory is created if missing.
    pub fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let base_url = self.llm.base_url.to_ascii_lowercase();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(EngineError::Config(format!(
                "llm.base_url must be an http(s) URL, got '{}'",
                self.llm.base_url
            )));
        }
        self.llm.base_url = sdk::normalize_endpoint(&self.llm.base_url);

        if self.llm.chat_timeout_secs == 0 || self.llm.generate_timeout_secs == 0 {
            return Err(EngineError::Config(
                "llm timeouts must be greater than 0".to_string(),
            ));
        }

        if self.registry.fetch_timeout_secs == 0 || self.registry.startup_budget_secs == 0 {
            return Err(EngineError::Config(
                "registry timeouts must be greater than 0".to_string(),
            ));
        }
        if self.registry.max_concurrent_fetches == 0 {
            return Err(EngineError::Config(
                "registry.max_concurrent_fetches must be greater than 0".to_string(),
            ));
        }

        if !self.dispatch.job_path.starts_with('/') {
            return Err(EngineError::Config(format!(
                "dispatch.job_path must start with '/', got '{}'",
                self.dispatch.job_path
            )));
        }
        if self.dispatch.result_limit == 0 || self.dispatch.timeout_secs == 0 {
            return Err(EngineError::Config(
                "dispatch.result_limit and dispatch.timeout_secs must be greater than 0"
                    .to_string(),
            ));
        }

        if self.search.top_k == 0 {
            return Err(EngineError::Config(
                "search.top_k must be greater than 0".to_string(),
            ));
        }
        if let Some(records_path) = &self.search.records_path {
            self.search.records_path = Some(expand_path(records_path)?);
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.dispatch.job_path, "/makejob");
        assert_eq!(config.dispatch.result_limit, 5);
        assert_eq!(config.dispatch.timeout_secs, 10);
        assert_eq!(config.registry.fetch_timeout_secs, 10);
        assert!(config.registry.reconcile_on_startup);
        assert!(config.registry.reconcile_interval().is_none());
        assert!(config.search.records_path.is_none());
        assert_eq!(config.search.endpoint, "internal");
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_path(&path).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        assert_eq!(expand_path(&path).unwrap(), path);
    }

    #[test]
    fn test_rejects_bad_job_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let toml = format!(
            "[core]\ndata_dir = {:?}\n\n[dispatch]\njob_path = \"makejob\"\n",
            dir.path()
        );

        let err = Config::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("job_path"));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let err = Config::from_toml_str("[core]\nlog_level = \"loud\"\n").unwrap_err();
        assert!(err.to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(config.llm.model, deserialized.llm.model);
        assert_eq!(config.dispatch.job_path, deserialized.dispatch.job_path);
    }
}
