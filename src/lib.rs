//! ATC Catalog Sync Core Library
//!
//! This library enriches a drug-identifier catalog with ATC classification
//! codes mined from registry pages and linked documents, and reconciles the
//! catalog against a remote tabular store.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`text`] - encoding recovery, mojibake repair, whitespace normalization
//! - [`extract`] - tiered ATC code extraction from free text
//! - [`fetch`] - paced HTTP fetching shared by every component
//! - [`resolver`] - tiered page/document resolution for one identifier
//! - [`catalog`] - flat-file parsing into canonical catalog records
//! - [`store`] - remote-store client, reconciliation diff, retry policy
//! - [`app`] - the reconcile and enrich run modes
//! - [`report`] - the semicolon-delimited enrichment diagnostic file
//! - [`config`] - one explicit value object for every tunable

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod catalog;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod report;
pub mod resolver;
pub mod store;
pub mod text;

// Re-export commonly used types
pub use catalog::{CatalogBuilder, CatalogError, CatalogRecord, DistributionStatus};
pub use config::{StoreSettings, SyncConfig};
pub use extract::{AtcExtractor, Extraction};
pub use fetch::{FetchError, Fetcher, RequestPacer};
pub use resolver::{
    DocumentResolver, DocumentTextExtractor, ExtractionResult, ExtractionSource, PdfTextExtractor,
};
pub use store::{
    CatalogDiff, RecordUpdate, RemoteRecord, RemoteStore, RetryPolicy, StoreError, compute_diff,
};
