//! The ingestion pipeline.
//!
//! One run moves an upload through
//! `Received → HashComputed → DuplicateChecked → Stored → TextExtracted →
//! FieldsAssembled → Persisted`. Validation and duplicate rejection happen
//! before any side effect. An object store failure aborts before the database
//! is touched. A database failure leaves the stored object in place for the
//! reconciliation sweep; nothing is rolled back.
//!
//! A run is a single future. Dropping it cancels the step in flight and
//! keeps the steps already completed.

use bytes::Bytes;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use super::address::{Addressed, ContentAddresser, DuplicateGuard};
use super::assembler::{IngestContext, InvoiceAssembler};
use crate::error::IngestError;
use crate::invoice::{AutoFieldExtractor, FieldExtractor, FormFields};
use crate::models::invoice::{InvoiceRecord, OBJECT_EXTENSION};
use crate::pdf::{PdfTextExtractor, TextExtractor};
use crate::storage::{InvoiceStore, ObjectStore};

/// Progress of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    HashComputed,
    DuplicateChecked,
    Stored,
    TextExtracted,
    FieldsAssembled,
    Persisted,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IngestStage::Received => "received",
            IngestStage::HashComputed => "hash_computed",
            IngestStage::DuplicateChecked => "duplicate_checked",
            IngestStage::Stored => "stored",
            IngestStage::TextExtracted => "text_extracted",
            IngestStage::FieldsAssembled => "fields_assembled",
            IngestStage::Persisted => "persisted",
        };
        f.write_str(s)
    }
}

/// One uploaded file.
pub struct Upload<R> {
    /// Name as supplied by the uploader.
    pub file_name: String,
    /// Size announced before the body, if known.
    pub declared_size: Option<u64>,
    /// The file content.
    pub reader: R,
}

impl<R> Upload<R> {
    pub fn new(file_name: impl Into<String>, reader: R) -> Self {
        Self {
            file_name: file_name.into(),
            declared_size: None,
            reader,
        }
    }

    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }
}

impl Upload<Cursor<Bytes>> {
    /// An upload of bytes already in memory.
    pub fn from_bytes(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self::new(file_name, Cursor::new(data)).with_declared_size(size)
    }
}

/// Ingests uploads into the object store and the invoice store.
pub struct IngestionPipeline {
    objects: Arc<dyn ObjectStore>,
    invoices: Arc<dyn InvoiceStore>,
    text: Arc<dyn TextExtractor>,
    auto: Option<AutoFieldExtractor>,
    addresser: ContentAddresser,
}

impl IngestionPipeline {
    /// Create a pipeline with the default PDF extractor, no language model
    /// and the default size limit.
    pub fn new(objects: Arc<dyn ObjectStore>, invoices: Arc<dyn InvoiceStore>) -> Self {
        Self {
            objects,
            invoices,
            text: Arc::new(PdfTextExtractor::new()),
            auto: None,
            addresser: ContentAddresser::default(),
        }
    }

    pub fn with_text_extractor(mut self, text: Arc<dyn TextExtractor>) -> Self {
        self.text = text;
        self
    }

    /// Enable automatic field extraction.
    pub fn with_auto_fields(mut self, auto: AutoFieldExtractor) -> Self {
        self.auto = Some(auto);
        self
    }

    pub fn with_max_file_size(mut self, max: u64) -> Self {
        self.addresser = ContentAddresser::new(max);
        self
    }

    /// Ingest one upload, with optional explicit field values.
    ///
    /// Returns the persisted record. A re-upload of stored content fails
    /// with [`IngestError::Conflict`] and changes nothing.
    pub async fn ingest<R>(
        &self,
        mut upload: Upload<R>,
        form: Option<&FormFields>,
    ) -> Result<InvoiceRecord, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        if !has_pdf_extension(&upload.file_name) {
            return Err(IngestError::Validation(format!(
                "{} is not a PDF file",
                upload.file_name
            )));
        }
        if let Some(declared) = upload.declared_size {
            self.addresser.check_declared_size(declared)?;
        }
        debug!("{}: {}", IngestStage::Received, upload.file_name);

        let Addressed { hash, bytes } = self.addresser.read(&mut upload.reader).await?;
        debug!("{}: {} ({} bytes)", IngestStage::HashComputed, hash, bytes.len());

        let existing = self
            .objects
            .list_keys()
            .await
            .map_err(|source| IngestError::ObjectStore {
                stage: IngestStage::DuplicateChecked,
                source,
            })?;
        let key = hash.object_key();
        if DuplicateGuard::new(existing).contains(&hash) {
            info!("Rejected {}: already stored as {}", upload.file_name, key);
            return Err(IngestError::Conflict { key });
        }
        debug!("{}: {}", IngestStage::DuplicateChecked, hash);

        self.objects
            .put(&key, bytes.clone())
            .await
            .map_err(|source| IngestError::ObjectStore {
                stage: IngestStage::Stored,
                source,
            })?;
        debug!("{}: {}", IngestStage::Stored, hash);

        let raw_text = self.extract_text(&upload.file_name, bytes).await;
        debug!("{}: {} ({} chars)", IngestStage::TextExtracted, hash, raw_text.len());

        let mut layers = Vec::with_capacity(2);
        if let Some(auto) = &self.auto {
            layers.push(auto.extract(&raw_text).await);
        }
        if let Some(form) = form {
            layers.push(form.extract(&raw_text).await);
        }
        let ctx = IngestContext {
            content_hash: hash,
            original_file_name: upload.file_name,
            raw_text,
        };
        let record = InvoiceAssembler::assemble(ctx, layers);
        debug!("{}: {}", IngestStage::FieldsAssembled, record.content_hash);

        if let Err(e) = self.invoices.upsert(&record).await {
            warn!(
                "Stored {} but failed to persist its record; left for reconciliation",
                key
            );
            return Err(IngestError::Persist(e));
        }
        debug!("{}: {}", IngestStage::Persisted, record.content_hash);

        info!(
            "Ingested {} as {}",
            record.original_file_name, record.content_hash
        );
        Ok(record)
    }

    /// Extract text on a blocking thread. Any failure degrades to empty text.
    async fn extract_text(&self, file_name: &str, bytes: Bytes) -> String {
        let extractor = Arc::clone(&self.text);
        let result = tokio::task::spawn_blocking(move || extractor.extract_text(&bytes)).await;

        match result {
            Ok(Ok(content)) => {
                if content.is_partial() {
                    warn!(
                        "{}: text missing for pages {:?}",
                        file_name, content.failed_pages
                    );
                }
                content.text
            }
            Ok(Err(e)) => {
                warn!("Failed to extract text from {}: {}", file_name, e);
                String::new()
            }
            Err(e) => {
                warn!("Text extraction task for {} failed: {}", file_name, e);
                String::new()
            }
        }
    }
}

fn has_pdf_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(OBJECT_EXTENSION))
}
