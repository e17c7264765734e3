//! Storage collaborators: the object store holding PDF files and the
//! invoice store holding records.

mod fs;
mod sqlite;

pub use fs::FsObjectStore;
pub use sqlite::SqliteInvoiceStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::error::{DbError, StoreError};
use crate::models::invoice::{ContentHash, InvoicePatch, InvoiceRecord};

/// Flat key/value storage for invoice files. Keys are `<hex>.pdf`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// All keys currently stored.
    async fn list_keys(&self) -> Result<HashSet<String>, StoreError>;

    /// A time-limited link to the object.
    async fn presigned_link(&self, key: &str, ttl: Duration) -> Result<Url, StoreError>;
}

/// Record counts after a bulk `file_exists` update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileExistsCounts {
    /// Records now flagged as having their file.
    pub present: usize,
    /// Records now flagged as missing their file.
    pub missing: usize,
}

/// Persistent invoice records keyed by content hash.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Insert the record, or replace the one with the same hash.
    async fn upsert(&self, record: &InvoiceRecord) -> Result<(), DbError>;

    async fn get(&self, hash: &ContentHash) -> Result<Option<InvoiceRecord>, DbError>;

    /// Write only the columns `patch` carries and return the updated record,
    /// or `None` if no record has this hash.
    async fn apply_patch(
        &self,
        hash: &ContentHash,
        patch: &InvoicePatch,
    ) -> Result<Option<InvoiceRecord>, DbError>;

    /// Every record, ordered by original file name then hash.
    async fn list_all(&self) -> Result<Vec<InvoiceRecord>, DbError>;

    /// Set `file_exists` on every record to whether its hash is in `present`,
    /// in one statement.
    async fn bulk_set_file_exists(
        &self,
        present: &HashSet<ContentHash>,
    ) -> Result<FileExistsCounts, DbError>;
}
