//! Tiered document resolution: locate the textual evidence of a record's ATC
//! code across its registry page, hyperlinked documents, and fall-back pages.
//!
//! # Architecture
//!
//! - [`DocumentResolver`] - drives the tiered search for one identifier
//! - [`html`] - visible-text extraction and prioritized link discovery
//! - [`DocumentTextExtractor`] - collaborator seam for document-to-text
//!   conversion ([`PdfTextExtractor`] in production)
//! - [`ExtractionResult`] - per-attempt outcome, tagged with its source tier
//!
//! The resolver never propagates network or document errors: an unreachable
//! page, an undersized download, or an unreadable document is logged and the
//! search moves on. Exhausting every candidate is a legitimate outcome
//! ([`ExtractionSource::None`]), not a failure.

pub mod document;
pub mod html;

pub use document::{DocumentError, DocumentTextExtractor, PdfTextExtractor};

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, instrument};
use url::Url;

use crate::config::{ResolverSettings, expand_template};
use crate::extract::{AtcExtractor, Extraction};
use crate::fetch::{FetchedBody, Fetcher};
use crate::text;

/// Where the winning evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    /// Found in the visible text of an HTML page.
    Page,
    /// Found in the extracted text of a downloaded document.
    Document,
    /// Every candidate was exhausted without a hit.
    None,
}

impl ExtractionSource {
    /// Stable tag used in logs and the diagnostic report.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Document => "document",
            Self::None => "none",
        }
    }
}

/// Outcome of one resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub code: Option<String>,
    pub level4: Option<String>,
    pub label: Option<String>,
    pub source: ExtractionSource,
    /// URL of the page or document the code was found in.
    pub source_url: Option<String>,
    /// 1-based page index within the document, when known.
    pub page_index: Option<usize>,
    /// Text surrounding the match, for the diagnostic report.
    pub snippet: Option<String>,
}

impl ExtractionResult {
    /// The empty outcome: every candidate exhausted.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            code: None,
            level4: None,
            label: None,
            source: ExtractionSource::None,
            source_url: None,
            page_index: None,
            snippet: None,
        }
    }

    fn from_extraction(
        extraction: Extraction,
        source: ExtractionSource,
        source_url: &Url,
        page_index: Option<usize>,
    ) -> Self {
        Self {
            code: Some(extraction.code),
            level4: Some(extraction.level4),
            label: extraction.label,
            source,
            source_url: Some(source_url.to_string()),
            page_index,
            snippet: Some(extraction.snippet),
        }
    }

    /// True when a code was found.
    #[must_use]
    pub fn found(&self) -> bool {
        self.code.is_some()
    }
}

/// Tiered resolver for one identifier: primary pages first, then a bounded,
/// priority-ordered traversal of linked documents.
pub struct DocumentResolver {
    fetcher: Fetcher,
    extractor: AtcExtractor,
    documents: Arc<dyn DocumentTextExtractor>,
    settings: ResolverSettings,
    page_templates: Vec<String>,
}

impl DocumentResolver {
    /// Creates a resolver.
    pub fn new(
        fetcher: Fetcher,
        documents: Arc<dyn DocumentTextExtractor>,
        settings: ResolverSettings,
        page_templates: Vec<String>,
    ) -> Self {
        Self {
            fetcher,
            extractor: AtcExtractor::new(),
            documents,
            settings,
            page_templates,
        }
    }

    /// Resolves the classification code for `identifier`.
    ///
    /// Candidate pages are tried in order: the known link (when well-formed
    /// `http(s)`) first, then the registry page templates. Page text wins over
    /// document text; within the document tier, direct `.pdf` targets win over
    /// cue-labelled links. Never errors: exhaustion yields an empty result.
    #[instrument(skip(self), fields(identifier = %identifier))]
    pub async fn resolve(&self, identifier: &str, known_link: Option<&str>) -> ExtractionResult {
        let page_urls = self.candidate_pages(identifier, known_link);

        let mut visited: HashSet<String> = page_urls.iter().cloned().collect();
        let mut fetched_pages: Vec<FetchedBody> = Vec::new();

        // Page tier.
        for url in &page_urls {
            let Some(body) = self.fetcher.try_get(url).await else {
                continue;
            };

            // A known link may point straight at a document.
            if body.is_pdf() {
                if let Some(result) = self.try_document(&body) {
                    return result;
                }
                continue;
            }

            let page_html = String::from_utf8_lossy(&body.bytes).into_owned();
            let page_text = html::visible_text(&page_html);
            if let Some(extraction) = self.extractor.extract(&page_text) {
                debug!(url = %body.final_url, "code found on page");
                return ExtractionResult::from_extraction(
                    extraction,
                    ExtractionSource::Page,
                    &body.final_url,
                    None,
                );
            }
            fetched_pages.push(body);
        }

        // Document tier: explicit depth-bounded, visited-guarded traversal
        // (link cycles between registry pages are real).
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        for body in &fetched_pages {
            let page_html = String::from_utf8_lossy(&body.bytes);
            self.enqueue_links(&page_html, &body.final_url, 1, &visited, &mut queue);
        }

        while let Some((url, depth)) = queue.pop_front() {
            if !visited.insert(url.clone()) {
                continue;
            }
            let Some(body) = self.fetcher.try_get(&url).await else {
                continue;
            };

            if body.is_pdf() {
                if let Some(result) = self.try_document(&body) {
                    return result;
                }
            } else if body.is_html() && depth < self.settings.max_depth {
                let page_html = String::from_utf8_lossy(&body.bytes).into_owned();
                let page_text = html::visible_text(&page_html);
                if let Some(extraction) = self.extractor.extract(&page_text) {
                    debug!(url = %body.final_url, "code found on linked page");
                    return ExtractionResult::from_extraction(
                        extraction,
                        ExtractionSource::Page,
                        &body.final_url,
                        None,
                    );
                }
                self.enqueue_links(&page_html, &body.final_url, depth + 1, &visited, &mut queue);
            }
        }

        debug!("candidates exhausted without a code");
        ExtractionResult::empty()
    }

    fn candidate_pages(&self, identifier: &str, known_link: Option<&str>) -> Vec<String> {
        let mut urls = Vec::new();
        if let Some(link) = known_link {
            let trimmed = link.trim();
            if (trimmed.starts_with("http://") || trimmed.starts_with("https://"))
                && Url::parse(trimmed).is_ok()
            {
                urls.push(trimmed.to_string());
            }
        }
        for template in &self.page_templates {
            let url = expand_template(template, identifier);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }

    fn enqueue_links(
        &self,
        page_html: &str,
        base_url: &Url,
        depth: usize,
        visited: &HashSet<String>,
        queue: &mut VecDeque<(String, usize)>,
    ) {
        let links = html::discover_document_links(page_html, base_url, &self.settings.link_cues);
        let taken = links
            .into_iter()
            .filter(|link| !visited.contains(&link.url))
            .take(self.settings.max_links_per_page);
        for link in taken {
            queue.push_back((link.url, depth));
        }
    }

    /// Runs extraction over a downloaded document, page by page. `None` means
    /// "no code here, keep searching", covering undersized bodies and
    /// unreadable documents alike.
    fn try_document(&self, body: &FetchedBody) -> Option<ExtractionResult> {
        if body.bytes.len() < self.settings.min_document_bytes {
            debug!(
                url = %body.final_url,
                bytes = body.bytes.len(),
                "undersized document discarded"
            );
            return None;
        }

        let pages = match self
            .documents
            .extract_pages(&body.bytes, self.settings.max_document_pages)
        {
            Ok(pages) => pages,
            Err(error) => {
                debug!(url = %body.final_url, error = %error, "document unreadable; continuing");
                return None;
            }
        };

        for (index, page) in pages.iter().enumerate() {
            let page_text = text::normalize_text(page);
            if let Some(extraction) = self.extractor.extract(&page_text) {
                debug!(url = %body.final_url, page = index + 1, "code found in document");
                return Some(ExtractionResult::from_extraction(
                    extraction,
                    ExtractionSource::Document,
                    &body.final_url,
                    Some(index + 1),
                ));
            }
        }
        None
    }
}

impl std::fmt::Debug for DocumentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentResolver")
            .field("settings", &self.settings)
            .field("page_templates", &self.page_templates)
            .finish_non_exhaustive()
    }
}
