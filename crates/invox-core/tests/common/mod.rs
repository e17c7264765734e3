//! In-memory collaborators for pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use invox_core::error::{DbError, LlmError, PdfError, StoreError};
use invox_core::pdf::PdfContent;
use invox_core::storage::FileExistsCounts;
use invox_core::{
    ContentHash, InvoicePatch, InvoiceRecord, InvoiceStore, LanguageModel, ObjectStore, SqliteInvoiceStore,
    TextExtractor,
};

/// Object store holding objects in a map, with switchable failures.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
    pub fail_list: AtomicBool,
    pub fail_put: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delete an object behind the pipeline's back.
    pub fn remove(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().remove(key)
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

fn injected() -> StoreError {
    StoreError::Io(std::io::Error::other("injected failure"))
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn list_keys(&self) -> Result<HashSet<String>, StoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(self.objects.lock().unwrap().keys().cloned().collect())
    }

    async fn presigned_link(&self, key: &str, _ttl: Duration) -> Result<Url, StoreError> {
        if !self.objects.lock().unwrap().contains_key(key) {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Url::parse(&format!("memory:///{key}")).map_err(|_| StoreError::InvalidKey(key.to_string()))
    }
}

/// SQLite store whose writes can be made to fail or to never complete.
pub struct FlakyInvoiceStore {
    inner: SqliteInvoiceStore,
    pub fail_upsert: AtomicBool,
    pub hang_upsert: AtomicBool,
}

impl FlakyInvoiceStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteInvoiceStore::open_in_memory().unwrap(),
            fail_upsert: AtomicBool::new(false),
            hang_upsert: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl InvoiceStore for FlakyInvoiceStore {
    async fn upsert(&self, record: &InvoiceRecord) -> Result<(), DbError> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(DbError::Task("injected failure".to_string()));
        }
        if self.hang_upsert.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.upsert(record).await
    }

    async fn get(&self, hash: &ContentHash) -> Result<Option<InvoiceRecord>, DbError> {
        self.inner.get(hash).await
    }

    async fn apply_patch(
        &self,
        hash: &ContentHash,
        patch: &InvoicePatch,
    ) -> Result<Option<InvoiceRecord>, DbError> {
        self.inner.apply_patch(hash, patch).await
    }

    async fn list_all(&self) -> Result<Vec<InvoiceRecord>, DbError> {
        self.inner.list_all().await
    }

    async fn bulk_set_file_exists(
        &self,
        present: &HashSet<ContentHash>,
    ) -> Result<FileExistsCounts, DbError> {
        self.inner.bulk_set_file_exists(present).await
    }
}

/// Language model returning a fixed reply.
pub struct ScriptedModel {
    reply: Result<String, String>,
    calls: Mutex<usize>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: Mutex::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: Err("service unavailable".to_string()),
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _prompt: &str, _json_mode: bool) -> Result<String, LlmError> {
        *self.calls.lock().unwrap() += 1;
        self.reply.clone().map_err(LlmError::Api)
    }
}

/// Text extractor returning fixed page texts, or failing outright.
pub struct FixedText {
    pages: Option<Vec<String>>,
    failed_pages: Vec<u32>,
}

impl FixedText {
    pub fn pages(pages: &[&str]) -> Arc<Self> {
        Self::partial(pages, &[])
    }

    /// Readable page texts plus the 1-indexed pages that could not be read.
    pub fn partial(pages: &[&str], failed_pages: &[u32]) -> Arc<Self> {
        Arc::new(Self {
            pages: Some(pages.iter().map(|p| p.to_string()).collect()),
            failed_pages: failed_pages.to_vec(),
        })
    }

    pub fn unreadable() -> Arc<Self> {
        Arc::new(Self {
            pages: None,
            failed_pages: Vec::new(),
        })
    }
}

impl TextExtractor for FixedText {
    fn extract_text(&self, _data: &[u8]) -> Result<PdfContent, PdfError> {
        let pages = self
            .pages
            .as_ref()
            .ok_or_else(|| PdfError::DocumentUnreadable("not a PDF".to_string()))?;
        Ok(PdfContent {
            text: pages.join("\n"),
            page_count: (pages.len() + self.failed_pages.len()) as u32,
            failed_pages: self.failed_pages.clone(),
        })
    }
}
