//! Retrocession list handling: spreadsheet link discovery and identifier
//! reading.
//!
//! The authority publishes the retrocession list as a spreadsheet whose URL
//! changes between revisions; the stable entry point is an HTML index page.
//! Discovery runs a regex over the raw HTML first and falls back to an
//! anchor-tag scan, in both cases keeping only `.xls` targets that carry the
//! configured keyword (accent- and case-insensitive).

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::LazyLock;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::resolver::html;
use crate::text;

use super::CatalogError;
use super::builder::digits_only;

static XLS_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["']([^"']*\.xlsx?[^"']*)["']"#)
        .unwrap_or_else(|e| panic!("invalid static regex: {e}"))
});

/// Discovers the spreadsheet URL on the index page.
///
/// Raw-HTML regex first; when nothing matches, every anchor is scanned and
/// matched on its label as well as its target. Relative targets are resolved
/// against `base_url`.
#[must_use]
pub fn discover_spreadsheet_link(page_html: &str, base_url: &Url, keyword: &str) -> Option<String> {
    let folded_keyword = text::fold_diacritics(keyword);

    for caps in XLS_HREF_RE.captures_iter(page_html) {
        let Some(href) = caps.get(1) else { continue };
        let Some(absolute) = html::absolutize_url(href.as_str().trim(), base_url) else {
            continue;
        };
        if text::fold_diacritics(&absolute).contains(&folded_keyword) {
            debug!(url = %absolute, "spreadsheet link found via raw-HTML scan");
            return Some(absolute);
        }
    }

    // Fallback: anchor scan, keyword allowed in the visible label too.
    let document = scraper::Html::parse_document(page_html);
    let selector = scraper::Selector::parse("a[href]").ok()?;
    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if !href.to_ascii_lowercase().contains(".xls") {
            continue;
        }
        let label = text::fold_diacritics(&anchor.text().collect::<String>());
        let Some(absolute) = html::absolutize_url(href, base_url) else {
            continue;
        };
        if label.contains(&folded_keyword)
            || text::fold_diacritics(&absolute).contains(&folded_keyword)
        {
            debug!(url = %absolute, "spreadsheet link found via anchor scan");
            return Some(absolute);
        }
    }
    None
}

/// Reads the retrocession identifiers from spreadsheet bytes: every sheet is
/// visited, the identifier sits in the same fixed column on each, and values
/// are digit-filtered (numeric cells included).
///
/// # Errors
///
/// Returns [`CatalogError::Spreadsheet`] when the workbook cannot be opened.
pub fn read_identifiers(
    bytes: &[u8],
    id_column: usize,
) -> Result<HashSet<String>, CatalogError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| CatalogError::spreadsheet(e.to_string()))?;

    let mut identifiers = HashSet::new();
    for sheet_name in workbook.sheet_names().to_owned() {
        let Ok(range) = workbook.worksheet_range(&sheet_name) else {
            debug!(sheet = %sheet_name, "unreadable sheet skipped");
            continue;
        };
        for row in range.rows() {
            let Some(cell) = row.get(id_column) else {
                continue;
            };
            let id = digits_only(&cell_to_string(cell));
            if !id.is_empty() {
                identifiers.insert(id);
            }
        }
    }

    debug!(identifiers = identifiers.len(), "retrocession list read");
    Ok(identifiers)
}

/// Renders one cell to text; whole-valued floats lose their fraction (the
/// registry stores identifiers as numeric cells).
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Int(value) => value.to_string(),
        #[allow(clippy::cast_possible_truncation)]
        Data::Float(value) if value.fract() == 0.0 => format!("{}", *value as i64),
        other => other.to_string(),
    }
}
