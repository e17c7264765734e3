//! Error types for the invox-core library.

use std::fmt;

use thiserror::Error;

use crate::ingest::IngestStage;
use crate::models::invoice::ContentHash;

/// Errors related to PDF text extraction.
#[derive(Error, Debug)]
pub enum PdfError {
    /// The document could not be opened at all.
    #[error("document unreadable: {0}")]
    DocumentUnreadable(String),

    /// The PDF is encrypted with a non-empty password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Text extraction failed on a single page.
    #[error("failed to extract text from page {page}: {reason}")]
    Page { page: u32, reason: String },
}

/// Errors raised while reading and hashing an upload.
#[derive(Error, Debug)]
pub enum AddressError {
    /// The upload is larger than the configured maximum.
    #[error("upload of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: u64, max: u64 },

    /// The upload stream could not be read.
    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from an object store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No object is stored under the key.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The key cannot be used as an object name.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// I/O error from the backing storage.
    #[error("object store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the invoice record store.
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLite error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored column holds a value that does not decode.
    #[error("corrupt value in column {column}: {value:?}")]
    Corrupt { column: &'static str, value: String },

    /// The connection lock was poisoned by a panicking query.
    #[error("database connection lock poisoned")]
    Poisoned,

    /// The blocking task running the query did not complete.
    #[error("database task failed: {0}")]
    Task(String),

    /// The database directory could not be created.
    #[error("database I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the language model client.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Could not reach the model endpoint.
    #[error("connection error: {0}")]
    Connection(String),

    /// The endpoint answered with a non-success status.
    #[error("API error: {0}")]
    Api(String),

    /// The endpoint answer could not be decoded.
    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// Errors loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error on the configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for [`crate::AppConfig`].
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of an ingestion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestErrorKind {
    /// Bad input shape, size or type. Caller's fault, not retryable.
    Validation,
    /// Identical content is already stored. Not a system failure.
    Conflict,
    /// Storage or database failure. The whole upload may be retried.
    IoFailure,
}

impl fmt::Display for IngestErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IngestErrorKind::Validation => "validation",
            IngestErrorKind::Conflict => "conflict",
            IngestErrorKind::IoFailure => "io",
        };
        f.write_str(s)
    }
}

/// Terminal failure of one ingestion run.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The upload was rejected before any side effect.
    #[error("invalid upload: {0}")]
    Validation(String),

    /// An object with the same content hash is already stored.
    #[error("invoice already uploaded as {key}")]
    Conflict { key: String },

    /// The upload stream failed while being read.
    #[error("failed to read upload: {0}")]
    Read(#[source] std::io::Error),

    /// The object store failed before `stage` was reached.
    #[error("object store failure before {stage}: {source}")]
    ObjectStore {
        stage: IngestStage,
        #[source]
        source: StoreError,
    },

    /// The record could not be persisted. The stored object is left in place,
    /// so a re-upload of the same file is rejected as a conflict.
    #[error("failed to persist invoice record: {0}")]
    Persist(#[source] DbError),
}

impl IngestError {
    /// Classify the error for the caller.
    pub fn kind(&self) -> IngestErrorKind {
        match self {
            IngestError::Validation(_) => IngestErrorKind::Validation,
            IngestError::Conflict { .. } => IngestErrorKind::Conflict,
            IngestError::Read(_) | IngestError::ObjectStore { .. } | IngestError::Persist(_) => {
                IngestErrorKind::IoFailure
            }
        }
    }

    /// Whether retrying the whole upload can succeed.
    ///
    /// A persist failure cannot be retried: the object is already stored.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Persist(_) => false,
            _ => self.kind() == IngestErrorKind::IoFailure,
        }
    }
}

impl From<AddressError> for IngestError {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::TooLarge { .. } => IngestError::Validation(err.to_string()),
            AddressError::Io(e) => IngestError::Read(e),
        }
    }
}

/// Errors from the reconciliation sweep.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The object listing could not be retrieved.
    #[error("failed to list stored objects: {0}")]
    Listing(#[from] StoreError),

    /// The bulk flag update failed.
    #[error("failed to update file flags: {0}")]
    Update(#[from] DbError),
}

/// Errors from record queries and corrections.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// No record exists for the hash.
    #[error("no invoice with hash {0}")]
    NotFound(ContentHash),

    /// Object store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invoice store failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_error_kinds() {
        let conflict = IngestError::Conflict { key: "ab.pdf".to_string() };
        assert_eq!(conflict.kind(), IngestErrorKind::Conflict);
        assert!(!conflict.is_retryable());

        let persist = IngestError::Persist(DbError::Poisoned);
        assert_eq!(persist.kind(), IngestErrorKind::IoFailure);
        assert!(!persist.is_retryable());

        let read = IngestError::Read(std::io::Error::other("reset"));
        assert!(read.is_retryable());
    }

    #[test]
    fn test_too_large_maps_to_validation() {
        let err: IngestError = AddressError::TooLarge { size: 11, max: 10 }.into();
        assert_eq!(err.kind(), IngestErrorKind::Validation);
        assert!(err.to_string().contains("exceeds"));
    }
}
