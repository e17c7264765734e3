//! Upload ingestion: hashing, duplicate detection, storage, extraction and
//! persistence of one invoice file.

mod address;
mod assembler;
mod pipeline;

pub use address::{Addressed, ContentAddresser, DEFAULT_MAX_SIZE, DuplicateGuard};
pub use assembler::{IngestContext, InvoiceAssembler};
pub use pipeline::{IngestStage, IngestionPipeline, Upload};
