//! Field extraction by a language model.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{CandidateFields, FieldExtractor};
use crate::llm::LanguageModel;

/// Instruction sent to the model. `{text}` is replaced with the document text.
pub const EXTRACTION_PROMPT: &str = r#"Read the invoice text below and extract the invoice number as "id", the issue date as "date" in YYYY-MM-DD format, and the total amount as "amount". Use null for any field that does not appear in the text. Reply with a single JSON object and nothing else, shaped like:
{"id": "123456", "date": "2021-01-01", "amount": 123.45}

Text: {text}"#;

/// Default cap on document text sent to the model, in bytes.
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 12_000;

/// Extracts fields by prompting a language model with the document text.
pub struct AutoFieldExtractor {
    model: Arc<dyn LanguageModel>,
    max_content_chars: usize,
}

/// Expected reply shape. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
struct AutoReply {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default)]
    amount: Option<Decimal>,
}

impl AutoFieldExtractor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }

    /// Set the maximum number of text bytes sent to the model.
    pub fn with_max_content_chars(mut self, max: usize) -> Self {
        self.max_content_chars = max;
        self
    }

    fn build_prompt(&self, text: &str) -> String {
        EXTRACTION_PROMPT.replace("{text}", truncate(text, self.max_content_chars))
    }
}

#[async_trait]
impl FieldExtractor for AutoFieldExtractor {
    fn name(&self) -> &'static str {
        "auto"
    }

    async fn extract(&self, text: &str) -> CandidateFields {
        let prompt = self.build_prompt(text);
        let reply = match self.model.complete(&prompt, true).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Failed to process text with language model: {}", e);
                return CandidateFields::default();
            }
        };
        debug!("Language model reply: {}", reply);

        match parse_reply(&reply) {
            Some(fields) => fields,
            None => {
                warn!("Language model reply is not a valid field object");
                CandidateFields::default()
            }
        }
    }
}

/// Parse a model reply into candidates, or `None` if it has the wrong shape.
fn parse_reply(reply: &str) -> Option<CandidateFields> {
    // Only an object counts. A derived struct would also accept a positional array.
    let value: serde_json::Value = serde_json::from_str(reply.trim()).ok()?;
    if !value.is_object() {
        return None;
    }
    let reply: AutoReply = serde_json::from_value(value).ok()?;
    Some(CandidateFields {
        external_id: reply.id,
        invoice_date: reply.date,
        amount: reply.amount,
        ..CandidateFields::default()
    })
}

/// Accept the invoice number as a string or a bare number. Blank is absent.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    let raw = Option::<RawId>::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawId::Text(s)) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Some(RawId::Number(n)) => Some(n.to_string()),
        None => None,
    })
}

/// Truncate to at most `max` bytes without splitting a character.
fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
