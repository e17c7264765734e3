//! Merging candidate fields into the record to persist.

use crate::invoice::CandidateFields;
use crate::models::invoice::{ContentHash, InvoiceRecord};

/// Facts established by the pipeline before extraction.
#[derive(Debug, Clone)]
pub struct IngestContext {
    pub content_hash: ContentHash,
    pub original_file_name: String,
    pub raw_text: String,
}

/// Builds the record for a freshly stored file.
pub struct InvoiceAssembler;

impl InvoiceAssembler {
    /// Apply `layers` in order over an empty record, later layers winning
    /// per field, then set identity, text and `file_exists` from `ctx`.
    pub fn assemble<I>(ctx: IngestContext, layers: I) -> InvoiceRecord
    where
        I: IntoIterator<Item = CandidateFields>,
    {
        let merged = layers
            .into_iter()
            .fold(CandidateFields::default(), CandidateFields::overlay);

        InvoiceRecord {
            content_hash: ctx.content_hash,
            original_file_name: ctx.original_file_name,
            external_id: merged.external_id,
            invoice_date: merged.invoice_date,
            amount: merged.amount,
            is_paid: merged.is_paid.unwrap_or(false),
            is_reviewed: merged.is_reviewed.unwrap_or(false),
            raw_text: ctx.raw_text,
            file_exists: true,
        }
    }
}
