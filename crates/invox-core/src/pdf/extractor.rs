//! Page-tolerant PDF text extraction using lopdf, with pdf-extract as fallback.

use lopdf::{Document, Object, ObjectId};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

use super::{PdfContent, Result, TextExtractor, push_page};
use crate::error::PdfError;

/// PDF text extractor.
///
/// Reads each page on its own so one broken page does not lose the rest of
/// the document. If no page yields any text, the whole document is handed to
/// `pdf_extract` as a second opinion.
#[derive(Debug, Clone)]
pub struct PdfTextExtractor {
    fallback: bool,
}

impl PdfTextExtractor {
    /// Create an extractor with the whole-document fallback enabled.
    pub fn new() -> Self {
        Self { fallback: true }
    }

    /// Enable or disable the `pdf_extract` fallback.
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    fn load(data: &[u8]) -> Result<(Document, Option<Vec<u8>>)> {
        let mut doc =
            Document::load_mem(data).map_err(|e| PdfError::DocumentUnreadable(e.to_string()))?;

        let mut decrypted = None;
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            let mut buf = Vec::new();
            match doc.save_to(&mut buf) {
                Ok(()) => decrypted = Some(buf),
                Err(e) => debug!("Could not re-serialize decrypted PDF: {}", e),
            }
        }

        Ok((doc, decrypted))
    }

    /// Check that every content stream of a page resolves.
    ///
    /// `Document::extract_text` skips unresolvable content streams without
    /// an error, which would drop the page's text silently.
    fn check_contents(doc: &Document, page_id: ObjectId) -> std::result::Result<(), String> {
        let page = doc.get_dictionary(page_id).map_err(|e| e.to_string())?;
        let Ok(contents) = page.get(b"Contents") else {
            return Ok(());
        };

        let resolved = match contents {
            Object::Reference(id) => doc
                .get_object(*id)
                .map_err(|e| format!("content object {} {}: {}", id.0, id.1, e))?,
            other => other,
        };
        let streams: Vec<&Object> = match resolved {
            Object::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        for stream in streams {
            let object = match stream {
                Object::Reference(id) => doc
                    .get_object(*id)
                    .map_err(|e| format!("content object {} {}: {}", id.0, id.1, e))?,
                other => other,
            };
            object.as_stream().map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    fn whole_document_text(data: &[u8]) -> Option<String> {
        // pdf_extract panics on some malformed fonts
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(data)
        }));

        match result {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                debug!("pdf_extract fallback failed: {}", e);
                None
            }
            Err(_) => {
                warn!("pdf_extract panicked during fallback extraction");
                None
            }
        }
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, data: &[u8]) -> Result<PdfContent> {
        let (doc, decrypted) = Self::load(data)?;

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(PdfError::NoPages);
        }

        let mut content = PdfContent {
            page_count: pages.len() as u32,
            ..PdfContent::default()
        };

        for (&page, &page_id) in &pages {
            let extracted = Self::check_contents(&doc, page_id)
                .and_then(|()| doc.extract_text(&[page]).map_err(|e| e.to_string()));
            match extracted {
                Ok(text) => push_page(&mut content.text, &text),
                Err(e) => {
                    let err = PdfError::Page { page, reason: e };
                    warn!("Skipping page: {}", err);
                    content.failed_pages.push(page);
                }
            }
        }

        if self.fallback && content.text.trim().is_empty() {
            let source = decrypted.as_deref().unwrap_or(data);
            if let Some(text) = Self::whole_document_text(source) {
                debug!("Recovered {} chars with pdf_extract", text.len());
                content.text = text;
                content.failed_pages.clear();
            }
        }

        debug!(
            "Extracted {} chars from {} pages ({} failed)",
            content.text.len(),
            content.page_count,
            content.failed_pages.len()
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Stream, dictionary};

    /// Build a minimal text PDF with one page per entry.
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_garbage_is_unreadable() {
        let extractor = PdfTextExtractor::new();
        let result = extractor.extract_text(b"definitely not a pdf");
        assert!(matches!(result, Err(PdfError::DocumentUnreadable(_))));
    }

    #[test]
    fn test_extracts_every_page_in_order() {
        let data = build_pdf(&["Invoice FV/2024/001", "Total 45.00"]);
        let content = PdfTextExtractor::new().extract_text(&data).unwrap();

        assert_eq!(content.page_count, 2);
        assert!(!content.is_partial());
        let first = content.text.find("FV/2024/001").unwrap();
        let second = content.text.find("45.00").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_blank_pages_yield_empty_text() {
        let data = build_pdf(&[""]);
        let content = PdfTextExtractor::new()
            .with_fallback(false)
            .extract_text(&data)
            .unwrap();
        assert_eq!(content.page_count, 1);
        assert!(content.text.trim().is_empty());
    }

    #[test]
    fn test_unresolvable_page_is_reported() {
        let data = build_pdf(&["Invoice #123", "lost page", "Total: 45.00"]);
        let mut doc = Document::load_mem(&data).unwrap();
        let page_id = doc.get_pages()[&2];
        doc.get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set("Contents", Object::Reference((9999, 0)));
        let mut broken = Vec::new();
        doc.save_to(&mut broken).unwrap();

        let content = PdfTextExtractor::new().extract_text(&broken).unwrap();

        assert_eq!(content.page_count, 3);
        assert_eq!(content.failed_pages, vec![2]);
        assert!(content.is_partial());
        assert!(content.text.contains("Invoice #123"));
        assert!(content.text.contains("Total: 45.00"));
        assert!(!content.text.contains("lost page"));
    }
}
