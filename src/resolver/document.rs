//! Document text extraction behind a trait seam.
//!
//! The resolution pipeline only needs "given document bytes, produce
//! best-effort extracted text, page by page". The production implementation
//! wraps `pdf-extract`; tests substitute a stub that maps fixture bytes to
//! known text.

use std::panic::{AssertUnwindSafe, catch_unwind};

use thiserror::Error;
use tracing::debug;

/// Errors from document text extraction.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The document could not be parsed or rendered to text.
    #[error("document text extraction failed: {detail}")]
    Extraction { detail: String },
}

impl DocumentError {
    /// Creates an extraction error.
    pub fn extraction(detail: impl Into<String>) -> Self {
        Self::Extraction {
            detail: detail.into(),
        }
    }
}

/// External collaborator contract: best-effort per-page text from document
/// bytes. `max_pages` bounds how many pages are extracted; 0 means all.
pub trait DocumentTextExtractor: Send + Sync {
    /// Extracts text page by page.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when the document cannot be read at all.
    fn extract_pages(&self, bytes: &[u8], max_pages: usize) -> Result<Vec<String>, DocumentError>;
}

/// PDF text extraction via the `pdf-extract` crate.
///
/// The crate panics on some malformed documents, so both calls run under
/// `catch_unwind`; a panic is reported as an ordinary extraction error and
/// handled like any other unreadable candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    /// Creates the extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DocumentTextExtractor for PdfTextExtractor {
    fn extract_pages(&self, bytes: &[u8], max_pages: usize) -> Result<Vec<String>, DocumentError> {
        let by_pages = catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(bytes)
        }));

        match by_pages {
            Ok(Ok(mut pages)) => {
                if max_pages > 0 {
                    pages.truncate(max_pages);
                }
                Ok(pages)
            }
            Ok(Err(error)) => {
                // Per-page extraction fails on some real documents that the
                // whole-document path still handles; fall back before giving up.
                debug!(error = %error, "per-page extraction failed; trying whole document");
                whole_document_fallback(bytes)
            }
            Err(_) => Err(DocumentError::extraction(
                "PDF backend panicked while reading the document",
            )),
        }
    }
}

fn whole_document_fallback(bytes: &[u8]) -> Result<Vec<String>, DocumentError> {
    let result = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)));
    match result {
        Ok(Ok(text)) => Ok(vec![text]),
        Ok(Err(error)) => Err(DocumentError::extraction(error.to_string())),
        Err(_) => Err(DocumentError::extraction(
            "PDF backend panicked while reading the document",
        )),
    }
}
