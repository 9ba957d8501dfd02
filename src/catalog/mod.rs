//! Canonical catalog records built from the authoritative registry files.
//!
//! - [`CatalogRecord`] - one record per registry identifier, rebuilt fresh on
//!   every run (records are never mutated in place; reconciliation computes
//!   replacement field sets for the remote store)
//! - [`DistributionStatus`] - the fixed-priority distribution classification
//! - [`builder`] - flat-file parsing and merging
//! - [`retrocession`] - spreadsheet link discovery and identifier reading

pub mod builder;
pub mod retrocession;

pub use builder::CatalogBuilder;

use thiserror::Error;

/// Errors from catalog construction sources.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The retrocession spreadsheet link could not be discovered on the
    /// index page.
    #[error("no retrocession spreadsheet link found on {index_url}")]
    MissingSpreadsheetLink { index_url: String },

    /// The spreadsheet could not be read.
    #[error("retrocession spreadsheet unreadable: {detail}")]
    Spreadsheet { detail: String },
}

impl CatalogError {
    /// Creates a missing-spreadsheet-link error for the given index page.
    pub fn missing_link(index_url: impl Into<String>) -> Self {
        Self::MissingSpreadsheetLink {
            index_url: index_url.into(),
        }
    }

    /// Creates a spreadsheet read error.
    pub fn spreadsheet(detail: impl Into<String>) -> Self {
        Self::Spreadsheet {
            detail: detail.into(),
        }
    }
}

/// Distribution status, decided by strict priority (first match wins):
/// retrocession membership, then reimbursement marker, then hospital-only
/// marker, then no information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistributionStatus {
    /// Dispensed to outpatients by hospital pharmacies.
    HospitalRetrocession,
    /// Available in city pharmacies (reimbursement marker present).
    CityPharmacy,
    /// Restricted to hospital use.
    HospitalOnly,
    /// Nothing in the sources says either way.
    #[default]
    NoInformation,
}

impl DistributionStatus {
    /// Stable label pushed to the remote store.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HospitalRetrocession => "hospital retrocession",
            Self::CityPharmacy => "city pharmacy",
            Self::HospitalOnly => "hospital-only",
            Self::NoInformation => "no information",
        }
    }

    /// Applies the fixed priority rule.
    #[must_use]
    pub fn classify(in_retrocession: bool, reimbursed: bool, hospital_only: bool) -> Self {
        if in_retrocession {
            Self::HospitalRetrocession
        } else if reimbursed {
            Self::CityPharmacy
        } else if hospital_only {
            Self::HospitalOnly
        } else {
            Self::NoInformation
        }
    }
}

impl std::fmt::Display for DistributionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One canonical catalog record. The identifier is the natural key; ATC
/// fields are owned by the enrichment pass and deliberately absent here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    /// Registry identifier (fixed-width numeric string, unique, non-empty).
    pub id: String,
    pub name: String,
    pub form: String,
    pub route: String,
    pub manufacturer: String,
    /// Public record page link derived from the identifier.
    pub link: String,
    /// 13-digit packaging code, when the packaging table carries one.
    pub packaging_code: Option<String>,
    /// Verbatim (normalized) prescription-condition text.
    pub conditions: Option<String>,
    pub status: DistributionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Error Tests ====================

    #[test]
    fn test_missing_link_error_names_index_page() {
        let error = CatalogError::missing_link("https://authority.example.com/retrocession");
        assert_eq!(
            error.to_string(),
            "no retrocession spreadsheet link found on https://authority.example.com/retrocession"
        );
    }

    // ==================== Status Priority Tests ====================

    #[test]
    fn test_retrocession_wins_over_everything() {
        assert_eq!(
            DistributionStatus::classify(true, true, true),
            DistributionStatus::HospitalRetrocession
        );
        assert_eq!(
            DistributionStatus::classify(true, false, false),
            DistributionStatus::HospitalRetrocession
        );
    }

    #[test]
    fn test_reimbursement_wins_over_hospital_only() {
        assert_eq!(
            DistributionStatus::classify(false, true, true),
            DistributionStatus::CityPharmacy
        );
    }

    #[test]
    fn test_hospital_only_before_no_information() {
        assert_eq!(
            DistributionStatus::classify(false, false, true),
            DistributionStatus::HospitalOnly
        );
        assert_eq!(
            DistributionStatus::classify(false, false, false),
            DistributionStatus::NoInformation
        );
    }

    #[test]
    fn test_status_labels_are_stable() {
        assert_eq!(
            DistributionStatus::HospitalRetrocession.as_str(),
            "hospital retrocession"
        );
        assert_eq!(DistributionStatus::CityPharmacy.as_str(), "city pharmacy");
        assert_eq!(DistributionStatus::HospitalOnly.as_str(), "hospital-only");
        assert_eq!(DistributionStatus::NoInformation.as_str(), "no information");
    }
}
