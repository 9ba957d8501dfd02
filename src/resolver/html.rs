//! HTML visible-text extraction and prioritized document-link discovery.

use scraper::{Html, Node, Selector};
use tracing::trace;
use url::Url;

use crate::text;

/// Extracts the visible text of an HTML page: markup, script, style, and head
/// content excluded, result normalized.
#[must_use]
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut collected = String::new();

    for node in document.tree.nodes() {
        let Node::Text(fragment) = node.value() else {
            continue;
        };
        let excluded = node.ancestors().any(|ancestor| {
            matches!(
                ancestor.value(),
                Node::Element(element)
                    if matches!(element.name(), "script" | "style" | "noscript" | "head")
            )
        });
        if !excluded {
            collected.push_str(fragment);
            collected.push(' ');
        }
    }

    text::normalize_text(&collected)
}

/// One discovered candidate link with the evidence that selected it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    pub url: String,
    /// True when the target path ends in the document extension (these sort
    /// ahead of cue-labelled links).
    pub direct_document: bool,
}

/// Discovers candidate document links in priority order: direct `.pdf`
/// targets first, then links whose visible label or target contains one of
/// the configured cue substrings. Relative and protocol-relative targets are
/// resolved against `base_url`; duplicates keep their first position.
#[must_use]
pub fn discover_document_links(html: &str, base_url: &Url, cues: &[String]) -> Vec<CandidateLink> {
    let document = Html::parse_document(html);
    let Ok(anchor_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let folded_cues: Vec<String> = cues.iter().map(|cue| text::fold_diacritics(cue)).collect();

    let mut direct = Vec::new();
    let mut cued = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for anchor in document.select(&anchor_selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(absolute) = absolutize_url(href.trim(), base_url) else {
            continue;
        };
        if !seen.insert(absolute.clone()) {
            continue;
        }

        let label = text::fold_diacritics(&anchor.text().collect::<String>());
        let folded_href = text::fold_diacritics(&absolute);

        if path_ends_with_pdf(&absolute) {
            trace!(url = %absolute, "direct document link");
            direct.push(CandidateLink {
                url: absolute,
                direct_document: true,
            });
        } else if folded_cues
            .iter()
            .any(|cue| label.contains(cue) || folded_href.contains(cue))
        {
            trace!(url = %absolute, "cue-labelled link");
            cued.push(CandidateLink {
                url: absolute,
                direct_document: false,
            });
        }
    }

    direct.extend(cued);
    direct
}

/// Resolves a possibly relative URL string against a base URL.
///
/// Absolute `http(s)` values pass through; `//host/...` is normalized to
/// `https:`; everything else joins against `base_url`.
#[must_use]
pub fn absolutize_url(value: &str, base_url: &Url) -> Option<String> {
    if value.is_empty() || value.starts_with('#') {
        return None;
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value.to_string());
    }
    if value.starts_with("//") {
        return Some(format!("https:{value}"));
    }
    base_url.join(value).ok().map(|url| url.to_string())
}

/// True when the URL path (query excluded) ends in `.pdf`.
#[must_use]
pub fn path_ends_with_pdf(url: &str) -> bool {
    Url::parse(url).is_ok_and(|parsed| parsed.path().to_ascii_lowercase().ends_with(".pdf"))
}
