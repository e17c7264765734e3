//! Core library for invoice ingestion.
//!
//! This crate provides:
//! - Content addressing and duplicate detection for uploaded PDFs
//! - Page-tolerant PDF text extraction
//! - Field extraction from explicit form values and from a language model
//! - The ingestion pipeline that stores the file and persists the merged record
//! - Reconciliation of the `file_exists` flag against the object store
//! - Collaborator backends: filesystem object store, SQLite invoice store,
//!   OpenAI-compatible language model client

pub mod error;
pub mod ingest;
pub mod invoice;
pub mod llm;
pub mod models;
pub mod pdf;
pub mod service;
pub mod storage;
pub mod sync;

pub use error::{
    AddressError, ConfigError, DbError, IngestError, IngestErrorKind, LlmError, PdfError,
    ServiceError, StoreError, SyncError,
};
pub use ingest::{
    ContentAddresser, DuplicateGuard, IngestContext, IngestStage, IngestionPipeline,
    InvoiceAssembler, Upload,
};
pub use invoice::{AutoFieldExtractor, CandidateFields, FieldExtractor, FormFields};
pub use llm::{LanguageModel, OpenAiClient};
pub use models::config::AppConfig;
pub use models::invoice::{ContentHash, ExistenceView, InvoicePatch, InvoiceRecord};
pub use pdf::{PdfContent, PdfTextExtractor, TextExtractor};
pub use service::InvoiceService;
pub use storage::{FileExistsCounts, FsObjectStore, InvoiceStore, ObjectStore, SqliteInvoiceStore};
pub use sync::{ReconciliationSweep, SweepReport};
