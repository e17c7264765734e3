//! Invoice record model, content identity and typed partial updates.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// Extension of every stored invoice object.
pub const OBJECT_EXTENSION: &str = "pdf";

/// Length of a hex-encoded SHA-256 digest.
const HASH_HEX_LEN: usize = 64;

/// Lowercase hex SHA-256 of a file's bytes.
///
/// Primary identity of an [`InvoiceRecord`] and stem of its object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash a complete byte slice.
    pub fn of(bytes: &[u8]) -> Self {
        Self::from_digest(&Sha256::digest(bytes))
    }

    /// Wrap a finished SHA-256 digest.
    pub fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// Parse a hex digest, accepting either case.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() != HASH_HEX_LEN || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(s.to_ascii_lowercase()))
    }

    /// Recover the hash from an object key by stripping its extension.
    pub fn from_object_key(key: &str) -> Option<Self> {
        let stem = key.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(key);
        Self::parse(stem)
    }

    /// Canonical object store key, `<hex>.pdf`.
    pub fn object_key(&self) -> String {
        format!("{}.{}", self.0, OBJECT_EXTENSION)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The persisted invoice.
///
/// The external JSON form uses camelCase keys, names the invoice number `id`
/// and the invoice date `date`, and never includes `raw_text`. Absent
/// optional fields serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRecord {
    /// Content hash of the stored file. Never changes once assigned.
    pub content_hash: ContentHash,

    /// File name as uploaded.
    pub original_file_name: String,

    /// Invoice number as printed on the document. Not unique.
    #[serde(rename = "id", default)]
    pub external_id: Option<String>,

    /// Invoice date.
    #[serde(rename = "date", default)]
    pub invoice_date: Option<NaiveDate>,

    /// Invoice total, currency not tracked.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,

    /// Set only by explicit user action.
    #[serde(default)]
    pub is_paid: bool,

    /// Set only by explicit user action.
    #[serde(default)]
    pub is_reviewed: bool,

    /// Full extracted text, kept for re-processing.
    #[serde(skip)]
    pub raw_text: String,

    /// Whether `<content_hash>.pdf` is currently in the object store.
    #[serde(default)]
    pub file_exists: bool,
}

impl InvoiceRecord {
    /// Create an empty record for a stored file.
    pub fn new(content_hash: ContentHash, original_file_name: impl Into<String>) -> Self {
        Self {
            content_hash,
            original_file_name: original_file_name.into(),
            external_id: None,
            invoice_date: None,
            amount: None,
            is_paid: false,
            is_reviewed: false,
            raw_text: String::new(),
            file_exists: false,
        }
    }
}

/// A partial update of the user-editable fields of a record.
///
/// Outer `None` leaves a field untouched. For the nullable fields,
/// `Some(None)` clears the value and `Some(Some(v))` sets it. In JSON an
/// absent key keeps, `null` clears, and a value sets.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoicePatch {
    #[serde(rename = "id", default, deserialize_with = "nullable")]
    pub external_id: Option<Option<String>>,

    #[serde(rename = "date", default, deserialize_with = "nullable")]
    pub invoice_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "nullable")]
    pub amount: Option<Option<Decimal>>,

    #[serde(default)]
    pub is_paid: Option<bool>,

    #[serde(default)]
    pub is_reviewed: Option<bool>,
}

impl InvoicePatch {
    /// Patch that only sets the payment flag.
    pub fn paid(is_paid: bool) -> Self {
        Self {
            is_paid: Some(is_paid),
            ..Self::default()
        }
    }

    /// Patch that only sets the review flag.
    pub fn reviewed(is_reviewed: bool) -> Self {
        Self {
            is_reviewed: Some(is_reviewed),
            ..Self::default()
        }
    }

    /// The patch with a blank invoice number turned into a clear.
    pub fn normalized(mut self) -> Self {
        self.external_id = self.external_id.take().map(|id| {
            id.and_then(|id| {
                let id = id.trim();
                (!id.is_empty()).then(|| id.to_string())
            })
        });
        self
    }

    /// True if applying the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.external_id.is_none()
            && self.invoice_date.is_none()
            && self.amount.is_none()
            && self.is_paid.is_none()
            && self.is_reviewed.is_none()
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Existence view of a hash: the record, if any, and whether its file is stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistenceView {
    pub invoice: Option<InvoiceRecord>,
    pub file_exists: bool,
}

impl ExistenceView {
    pub fn new(invoice: Option<InvoiceRecord>) -> Self {
        let file_exists = invoice.as_ref().is_some_and(|i| i.file_exists);
        Self { invoice, file_exists }
    }
}
