//! Runtime configuration for every pipeline component.
//!
//! The source registry URLs, remote-store endpoint and field names, pacing
//! delays, and traversal bounds all live in one explicit value object that is
//! constructed in `main` and passed into each component. Tests substitute
//! alternate endpoints and field maps the same way (no process-wide globals).

use std::time::Duration;

/// Placeholder substituted with the registry identifier in URL templates.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Top-level configuration, grouped by concern.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub registry: RegistrySettings,
    pub store: StoreSettings,
    pub fetch: FetchSettings,
    pub resolver: ResolverSettings,
    pub retry: RetrySettings,
}

/// Authoritative-source locations and parsing positions.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Primary listing flat file (identifier, name, form, route, manufacturer).
    pub primary_url: String,
    /// Packaging/reimbursement flat file.
    pub packaging_url: String,
    /// Prescription-condition flat file.
    pub conditions_url: String,
    /// HTML index page from which the retrocession spreadsheet link is
    /// discovered.
    pub retrocession_index_url: String,
    /// Keyword a candidate `.xls` link must contain (matched accent- and
    /// case-insensitively).
    pub retrocession_keyword: String,
    /// Zero-based column holding the identifier in every retrocession sheet.
    pub retrocession_id_column: usize,
    /// Candidate record page URLs, tried in order (`{id}` substituted).
    pub record_page_templates: Vec<String>,
    /// Public record link stored on each catalog record (`{id}` substituted).
    pub record_link_template: String,
}

/// Remote tabular store endpoint and schema.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Full table endpoint, e.g. `https://api.example.com/v0/appXXXX/Catalog`.
    pub endpoint: String,
    /// Bearer token.
    pub token: String,
    /// Page size requested from the paged list API.
    pub page_size: usize,
    /// Platform-imposed batch ceiling for create/update/delete.
    pub batch_size: usize,
    /// Pause between consecutive batch calls.
    pub batch_pacing: Duration,
    /// Status code on which the natural-key merge create falls back to a
    /// plain create. Explicit rather than inferred from error-message text.
    pub upsert_reject_status: u16,
    pub fields: FieldNames,
}

/// Store-side field names, overridable for test doubles.
#[derive(Debug, Clone)]
pub struct FieldNames {
    pub identifier: String,
    pub name: String,
    pub form: String,
    pub route: String,
    pub manufacturer: String,
    pub link: String,
    pub packaging: String,
    pub conditions: String,
    pub status: String,
    pub atc_code: String,
    pub atc_level4: String,
    pub atc_label: String,
}

/// Outbound HTTP behavior shared by all fetching components.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Minimum spacing between requests to the same domain.
    pub pacing: Duration,
    pub user_agent: String,
}

/// Document-resolution traversal bounds.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Candidate document links followed per page.
    pub max_links_per_page: usize,
    /// Substrings (matched accent- and case-insensitively against link labels
    /// and targets) that mark a link as a relevant specification document.
    pub link_cues: Vec<String>,
    /// Overall link-following depth cap (guards against page cycles).
    pub max_depth: usize,
    /// Responses smaller than this are treated as error pages, not documents.
    pub min_document_bytes: usize,
    /// Document pages text-extracted per candidate (0 = all).
    pub max_document_pages: usize,
}

/// Retry/backoff tunables for remote-store mutations.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        let base = "https://base-donnees-publique.medicaments.gouv.fr";
        Self {
            primary_url: format!("{base}/telechargement.php?fichier=CIS_bdpm.txt"),
            packaging_url: format!("{base}/telechargement.php?fichier=CIS_CIP_bdpm.txt"),
            conditions_url: format!("{base}/telechargement.php?fichier=CIS_CPD_bdpm.txt"),
            retrocession_index_url:
                "https://ansm.sante.fr/documents/reference/liste-des-medicaments-retrocedables"
                    .to_string(),
            retrocession_keyword: "retrocession".to_string(),
            retrocession_id_column: 1,
            record_page_templates: vec![
                format!("{base}/extrait.php?specid={ID_PLACEHOLDER}"),
                format!("{base}/affichageDoc.php?specid={ID_PLACEHOLDER}&typedoc=R"),
            ],
            record_link_template: format!("{base}/extrait.php?specid={ID_PLACEHOLDER}"),
        }
    }
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            identifier: "Code CIS".to_string(),
            name: "Nom".to_string(),
            form: "Forme".to_string(),
            route: "Voie".to_string(),
            manufacturer: "Laboratoire".to_string(),
            link: "Lien".to_string(),
            packaging: "Code CIP13".to_string(),
            conditions: "Conditions".to_string(),
            status: "Distribution".to_string(),
            atc_code: "Code ATC".to_string(),
            atc_level4: "ATC niveau 4".to_string(),
            atc_label: "Classe".to_string(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            pacing: Duration::from_millis(500),
            user_agent: concat!("atcsync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_links_per_page: 4,
            link_cues: vec![
                "rcp".to_string(),
                "caracteristiques du produit".to_string(),
                "notice".to_string(),
                "ansm".to_string(),
            ],
            max_depth: 2,
            min_document_bytes: 2048,
            max_document_pages: 0,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl StoreSettings {
    /// Builds store settings around an endpoint and token; everything else is
    /// the platform default (batch ceiling 10, page size 100).
    #[must_use]
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            page_size: 100,
            batch_size: 10,
            batch_pacing: Duration::from_millis(250),
            upsert_reject_status: 422,
            fields: FieldNames::default(),
        }
    }
}

/// Substitutes the identifier into a URL template.
#[must_use]
pub fn expand_template(template: &str, id: &str) -> String {
    template.replace(ID_PLACEHOLDER, id)
}
