//! Invoice field extraction module.
//!
//! Two sources produce candidate field values for a new record: the
//! language model reading the extracted text, and values the uploader
//! submitted explicitly. The assembler layers them with form values on top.

mod auto;
mod form;

pub use auto::{AutoFieldExtractor, EXTRACTION_PROMPT};
pub use form::FormFields;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Field values proposed by one extraction source. `None` means the source
/// has no opinion and lower layers are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFields {
    pub external_id: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub is_paid: Option<bool>,
    pub is_reviewed: Option<bool>,
}

impl CandidateFields {
    /// Layer `other` on top of `self`: every field present in `other` wins.
    pub fn overlay(mut self, other: CandidateFields) -> Self {
        if other.external_id.is_some() {
            self.external_id = other.external_id;
        }
        if other.invoice_date.is_some() {
            self.invoice_date = other.invoice_date;
        }
        if other.amount.is_some() {
            self.amount = other.amount;
        }
        if other.is_paid.is_some() {
            self.is_paid = other.is_paid;
        }
        if other.is_reviewed.is_some() {
            self.is_reviewed = other.is_reviewed;
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A source of candidate invoice fields.
///
/// Extraction never fails: a source that cannot produce values logs the
/// reason and returns empty candidates.
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Propose field values for a document with the given text.
    async fn extract(&self, text: &str) -> CandidateFields;
}
