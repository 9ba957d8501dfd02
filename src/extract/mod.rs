//! Tiered ATC code extraction from noisy source text.
//!
//! This module is the only place that knows the ATC code grammar
//! (`letter, digit, digit, letter, letter, digit, digit`). Matching runs in
//! three tiers against normalized text, first valid match wins:
//!
//! 1. **Labelled cue** - a descriptive clause followed by the `code ATC` cue
//!    (the clause is captured as the contextual label)
//! 2. **Bare cue** - the `code ATC` cue with no usable preceding clause
//! 3. **Anywhere** - any token matching the grammar, tolerating internal
//!    whitespace and punctuation between the 7 logical characters
//!
//! Every candidate passes through [`canonicalize_code`]; candidates that fail
//! the grammar are discarded silently and scanning continues. Extraction is
//! deterministic and performs no I/O.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

/// Tolerant form of one ATC token: 7 logical characters with optional
/// whitespace or punctuation between them.
const CODE_TOKEN: &str = r"[A-Za-z][\s.,\-]{0,3}\d[\s.,\-]{0,3}\d[\s.,\-]{0,3}[A-Za-z][\s.,\-]{0,3}[A-Za-z][\s.,\-]{0,3}\d[\s.,\-]{0,3}\d";

/// Exact grammar a canonical code must satisfy.
static CODE_GRAMMAR_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^[A-Z]\d{2}[A-Z]{2}\d{2}$"));

static LABELLED_CUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(&format!(
        r"(?i)([^\n:;.]{{4,120}}?)\s*[,;(\-]\s*code\s+ATC\s*:?\s*({CODE_TOKEN})"
    ))
});

static BARE_CUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(&format!(r"(?i)code\s+ATC\s*:?\s*({CODE_TOKEN})"))
});

static ANYWHERE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(&format!(
        r"(?i)(?:^|[^0-9A-Za-z])({CODE_TOKEN})(?:$|[^0-9A-Za-z])"
    ))
});

/// Characters of surrounding context kept on each side of a match for the
/// diagnostic snippet.
const SNIPPET_CONTEXT_BYTES: usize = 60;

fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// One successful extraction: the canonical code, its level-4 prefix, the
/// contextual label when the labelled tier matched, and a context snippet for
/// the diagnostic report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Canonical 7-character code.
    pub code: String,
    /// First 5 characters of the code (ATC level 4).
    pub level4: String,
    /// Descriptive clause preceding the cue phrase, when present.
    pub label: Option<String>,
    /// Text surrounding the match, single-line.
    pub snippet: String,
}

/// Tiered extractor over normalized text. Stateless; safe to share.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtcExtractor;

impl AtcExtractor {
    /// Creates an extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Extracts the first valid code from `text`, or `None` when no candidate
    /// survives canonicalization.
    #[must_use]
    pub fn extract(&self, text: &str) -> Option<Extraction> {
        // Tier 1: labelled cue.
        for caps in LABELLED_CUE_RE.captures_iter(text) {
            let (Some(label), Some(token)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if let Some(code) = canonicalize_code(token.as_str()) {
                let label_text = label.as_str().trim();
                trace!(code = %code, tier = "labelled", "code candidate accepted");
                return Some(build_extraction(
                    text,
                    code,
                    (!label_text.is_empty()).then(|| label_text.to_string()),
                    token.start(),
                    token.end(),
                ));
            }
        }

        // Tier 2: bare cue.
        for caps in BARE_CUE_RE.captures_iter(text) {
            let Some(token) = caps.get(1) else { continue };
            if let Some(code) = canonicalize_code(token.as_str()) {
                trace!(code = %code, tier = "cue", "code candidate accepted");
                return Some(build_extraction(text, code, None, token.start(), token.end()));
            }
        }

        // Tier 3: anywhere in the text.
        for caps in ANYWHERE_RE.captures_iter(text) {
            let Some(token) = caps.get(1) else { continue };
            if let Some(code) = canonicalize_code(token.as_str()) {
                trace!(code = %code, tier = "anywhere", "code candidate accepted");
                return Some(build_extraction(text, code, None, token.start(), token.end()));
            }
        }

        None
    }
}

fn build_extraction(
    text: &str,
    code: String,
    label: Option<String>,
    match_start: usize,
    match_end: usize,
) -> Extraction {
    Extraction {
        level4: level4_prefix(&code),
        snippet: snippet_around(text, match_start, match_end),
        code,
        label,
    }
}

/// Canonicalizes a candidate token: strips non-alphanumerics, uppercases, and
/// validates against the exact grammar. Returns `None` for malformed
/// candidates (the expected, common case in noisy text).
#[must_use]
pub fn canonicalize_code(token: &str) -> Option<String> {
    let canonical: String = token
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    CODE_GRAMMAR_RE.is_match(&canonical).then_some(canonical)
}

/// Derives the level-4 prefix (first 5 characters) of a canonical code.
///
/// Callers must pass a code that already satisfies the grammar; anything
/// shorter yields an empty prefix rather than a panic.
#[must_use]
pub fn level4_prefix(code: &str) -> String {
    code.chars().take(5).collect()
}

/// Returns a single-line context window around the match byte range.
fn snippet_around(text: &str, start: usize, end: usize) -> String {
    let mut from = start.saturating_sub(SNIPPET_CONTEXT_BYTES);
    while from > 0 && !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + SNIPPET_CONTEXT_BYTES).min(text.len());
    while to < text.len() && !text.is_char_boundary(to) {
        to += 1;
    }
    text[from..to].replace('\n', " ").trim().to_string()
}
