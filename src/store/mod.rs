//! Remote tabular store: paged listing, batched mutations, reconciliation
//! diffing, and the shared retry policy.
//!
//! # Architecture
//!
//! - [`RemoteStore`] - the HTTP client (list, create, update, delete)
//! - [`diff`] - natural-key reconciliation between catalog and store
//! - [`RetryPolicy`] - backoff for transient (429/5xx) failures
//! - [`StoreError`] - structured failures; store errors are always fatal to
//!   the run, unlike resolver failures which are skipped per record

pub mod client;
pub mod diff;
pub mod error;
pub mod retry;

pub use client::RemoteStore;
pub use diff::{CatalogDiff, RecordUpdate, compute_diff};
pub use error::StoreError;
pub use retry::RetryPolicy;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row as the store returns it: opaque row id plus named fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl RemoteRecord {
    /// Reads a field as text, `None` when absent or non-textual.
    #[must_use]
    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// True when the field is absent, non-textual, or blank.
    #[must_use]
    pub fn field_is_blank(&self, name: &str) -> bool {
        self.text_field(name).is_none_or(|value| value.trim().is_empty())
    }
}
