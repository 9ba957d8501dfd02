//! Flat-file parsing and merging into canonical catalog records.
//!
//! Three delimited tables feed the catalog: the primary listing, a packaging
//! table carrying the 13-digit packaging code and reimbursement markers, and
//! a free-text prescription-condition table. Delimiters are sniffed per
//! input, every cell runs through the text normalizer, and the merge key
//! across all three is the registry identifier.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, instrument};

use crate::config::{RegistrySettings, expand_template};
use crate::text;

use super::{CatalogRecord, DistributionStatus};

/// Delimiters considered during sniffing, in tie-break preference order.
const DELIMITER_CANDIDATES: [char; 4] = ['\t', ';', '|', ','];

/// Zero-based packaging-table columns whose non-blank content marks a record
/// as reimbursed (rate and agreement columns in the registry layout).
const REIMBURSEMENT_COLUMNS: [usize; 3] = [8, 9, 10];

/// Condition phrases (diacritics folded) that mark a record hospital-only.
/// The authoritative text mixes encodings, so matching is accent-insensitive.
const HOSPITAL_PHRASES: [&str; 3] = [
    "reserve hospitalier",
    "usage hospitalier",
    "prescription hospitaliere",
];

/// Exact digit count of a packaging code.
const PACKAGING_CODE_LEN: usize = 13;

#[derive(Debug, Default)]
struct PackagingInfo {
    packaging_code: Option<String>,
    reimbursed: bool,
}

#[derive(Debug, Default)]
struct ConditionInfo {
    text: String,
    hospital_only: bool,
}

/// Builds canonical catalog records from the registry flat files.
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    registry: RegistrySettings,
}

impl CatalogBuilder {
    /// Creates a builder over the given registry settings.
    #[must_use]
    pub fn new(registry: RegistrySettings) -> Self {
        Self { registry }
    }

    /// Parses and merges the three tables into identifier-keyed records.
    ///
    /// Inputs are decoded but not yet whitespace-collapsed (cell structure
    /// must survive); records present only in the primary table get default
    /// packaging and condition fields.
    #[must_use]
    #[instrument(skip_all, fields(retrocession_ids = retrocession.len()))]
    pub fn build(
        &self,
        primary: &str,
        packaging: &str,
        conditions: &str,
        retrocession: &HashSet<String>,
    ) -> BTreeMap<String, CatalogRecord> {
        let packaging_by_id = parse_packaging(packaging);
        let conditions_by_id = parse_conditions(conditions);

        let mut records = BTreeMap::new();
        let delimiter = sniff_delimiter(primary);
        let mut skipped = 0usize;

        for line in primary.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let cells: Vec<String> = line
                .split(delimiter)
                .map(text::normalize_text)
                .collect();
            if cells.len() < 5 {
                skipped += 1;
                continue;
            }
            let id = digits_only(&cells[0]);
            if id.is_empty() {
                skipped += 1;
                continue;
            }

            let packaging_info = packaging_by_id.get(&id);
            let condition_info = conditions_by_id.get(&id);

            let status = DistributionStatus::classify(
                retrocession.contains(&id),
                packaging_info.is_some_and(|p| p.reimbursed),
                condition_info.is_some_and(|c| c.hospital_only),
            );

            let record = CatalogRecord {
                link: expand_template(&self.registry.record_link_template, &id),
                name: cells[1].clone(),
                form: cells[2].clone(),
                route: cells[3].clone(),
                manufacturer: cells[4].clone(),
                packaging_code: packaging_info.and_then(|p| p.packaging_code.clone()),
                conditions: condition_info
                    .filter(|c| !c.text.is_empty())
                    .map(|c| c.text.clone()),
                status,
                id,
            };
            records.insert(record.id.clone(), record);
        }

        debug!(
            records = records.len(),
            skipped, "primary table parsed and merged"
        );
        records
    }
}

/// Picks the most frequent candidate delimiter on the first non-empty line;
/// ties and all-zero counts fall back to the earliest candidate.
#[must_use]
pub fn sniff_delimiter(table: &str) -> char {
    let Some(first_line) = table.lines().find(|line| !line.trim().is_empty()) else {
        return DELIMITER_CANDIDATES[0];
    };

    let mut best = DELIMITER_CANDIDATES[0];
    let mut best_count = 0usize;
    for candidate in DELIMITER_CANDIDATES {
        let count = first_line.matches(candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

/// Keeps only ASCII digits.
#[must_use]
pub fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

fn parse_packaging(table: &str) -> HashMap<String, PackagingInfo> {
    let delimiter = sniff_delimiter(table);
    let mut by_id: HashMap<String, PackagingInfo> = HashMap::new();

    for line in table.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<String> = line.split(delimiter).map(text::normalize_text).collect();
        let Some(first) = cells.first() else { continue };
        let id = digits_only(first);
        if id.is_empty() {
            continue;
        }

        let packaging_code = cells[1..]
            .iter()
            .map(|cell| digits_only(cell))
            .find(|digits| digits.len() == PACKAGING_CODE_LEN);
        let reimbursed = REIMBURSEMENT_COLUMNS
            .iter()
            .any(|&index| cells.get(index).is_some_and(|cell| !cell.trim().is_empty()));

        let entry = by_id.entry(id).or_default();
        if entry.packaging_code.is_none() {
            entry.packaging_code = packaging_code;
        }
        entry.reimbursed |= reimbursed;
    }
    by_id
}

fn parse_conditions(table: &str) -> HashMap<String, ConditionInfo> {
    let delimiter = sniff_delimiter(table);
    let mut by_id: HashMap<String, ConditionInfo> = HashMap::new();

    for line in table.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<String> = line.split(delimiter).map(text::normalize_text).collect();
        if cells.len() < 2 {
            continue;
        }
        let id = digits_only(&cells[0]);
        if id.is_empty() {
            continue;
        }

        let condition = cells[1..].join(" ").trim().to_string();
        if condition.is_empty() {
            continue;
        }

        let entry = by_id.entry(id).or_default();
        if entry.text.is_empty() {
            entry.text = condition.clone();
        } else {
            // A record can carry several condition rows; keep them all.
            entry.text.push_str("; ");
            entry.text.push_str(&condition);
        }

        let folded = text::fold_diacritics(&condition);
        entry.hospital_only |= HOSPITAL_PHRASES
            .iter()
            .any(|phrase| folded.contains(phrase));
    }
    by_id
}
