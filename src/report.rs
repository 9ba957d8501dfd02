//! Diagnostic report for the enrichment pass.
//!
//! Semicolon-delimited rows, one per processed record: identifier, resolved
//! code, source tier, source URL, document page index, and the text snippet
//! around the match. The report is a debugging aid; only failing to open the
//! file is fatal, so a run is never lost to a full disk mid-way.

use std::path::Path;

use csv::WriterBuilder;
use thiserror::Error;
use tracing::warn;

use crate::resolver::ExtractionResult;

/// Errors opening or writing the report file.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: csv::Error,
    },
}

impl ReportError {
    fn write(path: impl Into<String>, source: csv::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

/// Appending writer over the semicolon-delimited report file.
pub struct ReportWriter {
    writer: csv::Writer<std::fs::File>,
    path: String,
}

impl ReportWriter {
    /// Creates the file (truncating any previous run) and writes the header.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Write`] when the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, ReportError> {
        let display = path.display().to_string();
        let mut writer = WriterBuilder::new()
            .delimiter(b';')
            .from_path(path)
            .map_err(|e| ReportError::write(&display, e))?;
        writer
            .write_record(["identifier", "code", "source", "url", "page", "snippet"])
            .map_err(|e| ReportError::write(&display, e))?;
        Ok(Self {
            writer,
            path: display,
        })
    }

    /// Appends one row. Write failures are logged, not propagated.
    pub fn append(&mut self, identifier: &str, result: &ExtractionResult) {
        let page = result.page_index.map(|p| p.to_string()).unwrap_or_default();
        let row = [
            identifier,
            result.code.as_deref().unwrap_or_default(),
            result.source.as_str(),
            result.source_url.as_deref().unwrap_or_default(),
            page.as_str(),
            result.snippet.as_deref().unwrap_or_default(),
        ];
        if let Err(error) = self.writer.write_record(row) {
            warn!(path = %self.path, %error, "report row dropped");
        }
    }

    /// Flushes buffered rows to disk.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Write`] when the flush fails.
    pub fn finish(mut self) -> Result<(), ReportError> {
        self.writer
            .flush()
            .map_err(|e| ReportError::write(&self.path, csv::Error::from(e)))
    }
}
