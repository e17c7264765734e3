//! Configuration structures for the ingestion service.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Main configuration for invox.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Object store and database locations.
    pub storage: StorageConfig,

    /// Upload limits.
    pub ingest: IngestConfig,

    /// Language model used for automatic field extraction.
    pub llm: LlmConfig,

    /// Reconciliation sweep settings.
    pub sync: SyncConfig,
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `<hash>.pdf` objects.
    pub objects_dir: PathBuf,

    /// SQLite database file.
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            objects_dir: PathBuf::from("invoices"),
            database_path: PathBuf::from("invox.db"),
        }
    }
}

/// Upload limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum upload size in bytes.
    pub max_file_size: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_file_size: crate::ingest::DEFAULT_MAX_SIZE,
        }
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Run automatic extraction at all.
    pub enabled: bool,

    /// Base URL, `/chat/completions` is appended.
    pub endpoint: String,

    /// Model name sent with every request.
    pub model: String,

    /// API key. Takes precedence over `api_key_env`.
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Extracted text beyond this many characters is not sent.
    pub max_content_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.groq.com/openai/v1".to_string(),
            model: "llama3-8b-8192".to_string(),
            api_key: None,
            api_key_env: "GROQ_API_KEY".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
            max_content_chars: 12_000,
        }
    }
}

impl LlmConfig {
    /// The configured key, or the value of `api_key_env`. Blank keys count as unset.
    pub fn resolve_api_key(&self) -> Option<String> {
        let non_blank = |k: &String| !k.trim().is_empty();
        self.api_key
            .clone()
            .filter(non_blank)
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(non_blank))
    }
}

/// Reconciliation sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Run a sweep before serving any command.
    pub on_startup: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { on_startup: true }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
