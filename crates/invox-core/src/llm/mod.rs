//! Language model access for automatic field extraction.
//!
//! The model is optional: when no client is configured, ingestion relies on
//! form values alone.

mod client;

pub use client::OpenAiClient;

use async_trait::async_trait;

use crate::error::LlmError;

/// A text completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt`. With `json_mode` the backend is asked to reply with
    /// a single JSON object.
    async fn complete(&self, prompt: &str, json_mode: bool) -> Result<String, LlmError>;
}
