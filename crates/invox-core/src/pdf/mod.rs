//! PDF text extraction module.

mod extractor;

pub use extractor::PdfTextExtractor;

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Text pulled out of a PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfContent {
    /// Text of every readable page, in page order.
    pub text: String,
    /// Number of pages in the document.
    pub page_count: u32,
    /// 1-indexed pages whose text could not be extracted.
    pub failed_pages: Vec<u32>,
}

impl PdfContent {
    /// Whether any page failed to yield text.
    pub fn is_partial(&self) -> bool {
        !self.failed_pages.is_empty()
    }
}

/// Trait for PDF text extraction implementations.
///
/// Extraction is CPU-bound and synchronous; callers on an async runtime
/// should run it on a blocking thread.
pub trait TextExtractor: Send + Sync {
    /// Extract the text of every readable page.
    fn extract_text(&self, data: &[u8]) -> Result<PdfContent>;
}

/// Append one page's text, separating pages with a single newline.
pub(crate) fn push_page(text: &mut String, page: &str) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(page);
}
