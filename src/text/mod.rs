//! Text normalization for registry flat files, HTML pages, and document text.
//!
//! Every text-producing stage of the pipeline funnels through this module so
//! that encoding recovery, mojibake repair, and whitespace collapsing happen in
//! exactly one place.
//!
//! # Overview
//!
//! - [`normalize_bytes`] - decode raw bytes (UTF-8 first, Windows-1252 next,
//!   lossy as a last resort) and normalize the result
//! - [`normalize_text`] - mojibake repair plus whitespace collapsing on text
//!   that is already decoded
//!
//! Both functions are total: they never fail, regardless of input.

use std::borrow::Cow;
use std::sync::LazyLock;

use encoding_rs::WINDOWS_1252;
use regex::Regex;

/// Doubly-encoded marker sequences that betray UTF-8 text that was decoded as
/// a single-byte encoding somewhere upstream. Repair only runs when one of
/// these is present, so already-correct text is never touched.
const MOJIBAKE_MARKERS: [&str; 8] = ["Ã©", "Ã¨", "Ãª", "Ã´", "Ã§", "Ã€", "â€", "Å“"];

/// Non-breaking space variants that the registry files mix freely with
/// ordinary spaces.
const NBSP_VARIANTS: [char; 3] = ['\u{00A0}', '\u{202F}', '\u{2007}'];

static CONTROL_RUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"[\u{00}-\u{09}\u{0B}-\u{1F}\u{7F} ]+")
});

static NEWLINE_PADDING_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r" ?\n ?"));

static MULTI_NEWLINE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\n{3,}"));

/// Compiles a regex at static init; panics on invalid pattern.
fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Decodes raw bytes and normalizes the result.
///
/// Encoding recovery order: strict UTF-8, then Windows-1252 (the encoding the
/// registry actually ships), then lossy UTF-8 with replacement characters.
/// The function never fails.
#[must_use]
pub fn normalize_bytes(raw: &[u8]) -> String {
    normalize_text(&decode_best_effort(raw))
}

/// Normalizes already-decoded text: mojibake repair followed by the
/// whitespace pass.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    collapse_whitespace(&repair_mojibake(text))
}

/// Decodes raw bytes without the whitespace pass.
///
/// Flat registry tables go through this instead of [`normalize_bytes`] so the
/// tab/semicolon cell structure survives; each cell is normalized after
/// splitting.
#[must_use]
pub fn decode_bytes(raw: &[u8]) -> String {
    decode_best_effort(raw)
}

/// Lowercases and strips the diacritics the registry text actually uses, for
/// accent-insensitive phrase and keyword matching across mixed encodings.
#[must_use]
pub fn fold_diacritics(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .flat_map(|c| match c {
            'à' | 'â' | 'ä' | 'á' | 'ã' => vec!['a'],
            'é' | 'è' | 'ê' | 'ë' => vec!['e'],
            'î' | 'ï' | 'í' => vec!['i'],
            'ô' | 'ö' | 'ó' | 'õ' => vec!['o'],
            'ù' | 'û' | 'ü' | 'ú' => vec!['u'],
            'ç' => vec!['c'],
            'ñ' => vec!['n'],
            'œ' => vec!['o', 'e'],
            'æ' => vec!['a', 'e'],
            other => vec![other],
        })
        .collect()
}

fn decode_best_effort(raw: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(raw) {
        return text.to_string();
    }

    // Windows-1252 maps every byte, so this branch does not report errors in
    // practice.
    let (decoded, had_errors) = WINDOWS_1252.decode_without_bom_handling(raw);
    if had_errors {
        return String::from_utf8_lossy(raw).into_owned();
    }
    decoded.into_owned()
}

/// Repairs doubly-encoded UTF-8 (UTF-8 bytes decoded as Windows-1252).
///
/// Applied only when a tell-tale marker sequence is present: the text is
/// re-encoded as Windows-1252 and re-decoded as strict UTF-8, and the repair
/// is kept only when that round trip succeeds cleanly.
#[must_use]
pub fn repair_mojibake(text: &str) -> Cow<'_, str> {
    if !MOJIBAKE_MARKERS.iter().any(|marker| text.contains(marker)) {
        return Cow::Borrowed(text);
    }

    let (bytes, _, had_unmappable) = WINDOWS_1252.encode(text);
    if had_unmappable {
        return Cow::Borrowed(text);
    }

    match std::str::from_utf8(&bytes) {
        Ok(repaired) => Cow::Owned(repaired.to_string()),
        Err(_) => Cow::Borrowed(text),
    }
}

/// Collapses whitespace: NBSP variants become spaces, runs of control/space
/// characters become one space, 3+ consecutive line breaks become 2, and the
/// ends are trimmed. The output contains no control characters other than
/// `\n`.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    let mut cleaned = text.replace("\r\n", "\n").replace('\r', "\n");
    for nbsp in NBSP_VARIANTS {
        cleaned = cleaned.replace(nbsp, " ");
    }
    let cleaned = CONTROL_RUN_RE.replace_all(&cleaned, " ");
    let cleaned = NEWLINE_PADDING_RE.replace_all(&cleaned, "\n");
    let cleaned = MULTI_NEWLINE_RE.replace_all(&cleaned, "\n\n");
    cleaned.trim().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== Decoding Tests ====================

    #[test]
    fn test_normalize_bytes_valid_utf8_passthrough() {
        assert_eq!(normalize_bytes("réservé".as_bytes()), "réservé");
    }

    #[test]
    fn test_normalize_bytes_windows_1252_accents() {
        // "réservé" encoded as Windows-1252: é = 0xE9
        let raw = b"r\xE9serv\xE9";
        assert_eq!(normalize_bytes(raw), "réservé");
    }

    #[test]
    fn test_normalize_bytes_never_panics_on_arbitrary_bytes() {
        let samples: [&[u8]; 4] = [b"", b"\xFF\xFE\x00", b"\x80\x81\x82", b"ok\xC3"];
        for raw in samples {
            let out = normalize_bytes(raw);
            assert!(
                out.chars().all(|c| c == '\n' || !c.is_control()),
                "control characters leaked for input {raw:?}: {out:?}"
            );
        }
    }

    // ==================== Mojibake Tests ====================

    #[test]
    fn test_repair_mojibake_double_encoded_text() {
        // "réservé" UTF-8 bytes decoded as Windows-1252 once too often
        let broken = "rÃ©servÃ©";
        assert_eq!(repair_mojibake(broken), "réservé");
    }

    #[test]
    fn test_repair_mojibake_leaves_correct_text_untouched() {
        let correct = "réservé à l'usage hospitalier";
        assert_eq!(repair_mojibake(correct), correct);
    }

    #[test]
    fn test_repair_mojibake_without_markers_is_borrowed() {
        let plain = "plain ascii text";
        assert!(matches!(repair_mojibake(plain), Cow::Borrowed(_)));
    }

    #[test]
    fn test_repair_mojibake_oe_ligature() {
        assert_eq!(repair_mojibake("Å“dÃ¨me"), "œdème");
    }

    // ==================== Whitespace Tests ====================

    #[test]
    fn test_collapse_whitespace_nbsp_variants() {
        assert_eq!(
            collapse_whitespace("Code\u{00A0}ATC\u{202F}:\u{2007}N05AH03"),
            "Code ATC : N05AH03"
        );
    }

    #[test]
    fn test_collapse_whitespace_control_runs() {
        assert_eq!(collapse_whitespace("a\t\t b\x0c\x0b c"), "a b c");
    }

    #[test]
    fn test_collapse_whitespace_excess_line_breaks() {
        assert_eq!(collapse_whitespace("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_whitespace("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_collapse_whitespace_crlf_and_trim() {
        assert_eq!(collapse_whitespace("  a\r\nb\r\n  "), "a\nb");
    }

    // ==================== Folding Tests ====================

    #[test]
    fn test_fold_diacritics_french_phrases() {
        assert_eq!(
            fold_diacritics("Réservé à l'usage HOSPITALIER"),
            "reserve a l'usage hospitalier"
        );
        assert_eq!(fold_diacritics("rétrocession"), "retrocession");
        assert_eq!(fold_diacritics("œdème"), "oedeme");
    }

    #[test]
    fn test_decode_bytes_preserves_tabs() {
        let raw = b"61266250\tDOLIPRANE\tcomprim\xE9";
        assert_eq!(decode_bytes(raw), "61266250\tDOLIPRANE\tcomprimé");
    }

    #[test]
    fn test_normalize_text_is_idempotent() {
        let once = normalize_text("  Code\u{00A0}ATC :\t N05A H03.\n\n\n\n");
        let twice = normalize_text(&once);
        assert_eq!(once, twice);
    }
}
