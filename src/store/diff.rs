//! Reconciliation diff between the fresh catalog and the remote store.
//!
//! Rows are matched on the natural key (the registry identifier field). The
//! diff yields three sets, applied in the fixed order delete, create, update,
//! so a deleted-then-recreated key can never collide with its stale row.
//!
//! Update payloads are replacement field sets that exclude the natural key
//! (it matched, rewriting it is pointless) and the enrichment-owned
//! classification fields (reconciliation must never clobber what the
//! enrichment pass wrote).

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::catalog::CatalogRecord;
use crate::config::FieldNames;

use super::RemoteRecord;

/// One pending update: the store-side row id and its replacement fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    pub record_id: String,
    pub fields: Map<String, Value>,
}

/// The three reconciliation sets.
#[derive(Debug, Clone, Default)]
pub struct CatalogDiff {
    /// Full field sets for rows absent from the store.
    pub create: Vec<Map<String, Value>>,
    /// Replacement field sets for rows present on both sides.
    pub update: Vec<RecordUpdate>,
    /// Store-side row ids whose key is absent from the catalog.
    pub delete: Vec<String>,
}

impl CatalogDiff {
    /// True when there is nothing to apply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Computes the reconciliation diff.
///
/// Remote rows without a readable natural key are scheduled for deletion, as
/// are duplicate rows beyond the first occurrence of a key.
#[must_use]
pub fn compute_diff(
    catalog: &BTreeMap<String, CatalogRecord>,
    remote: &[RemoteRecord],
    fields: &FieldNames,
) -> CatalogDiff {
    let mut diff = CatalogDiff::default();

    let mut remote_by_key: BTreeMap<&str, &RemoteRecord> = BTreeMap::new();
    for record in remote {
        let Some(key) = record
            .fields
            .get(&fields.identifier)
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())
        else {
            diff.delete.push(record.id.clone());
            continue;
        };
        if remote_by_key.contains_key(key) {
            // Duplicate key: the first row stays matched, later rows go.
            diff.delete.push(record.id.clone());
        } else {
            remote_by_key.insert(key, record);
        }
    }

    for (key, record) in &remote_by_key {
        if !catalog.contains_key(*key) {
            diff.delete.push(record.id.clone());
        }
    }

    for (key, record) in catalog {
        match remote_by_key.get(key.as_str()) {
            Some(remote_record) => diff.update.push(RecordUpdate {
                record_id: remote_record.id.clone(),
                fields: update_fields(record, fields),
            }),
            None => diff.create.push(create_fields(record, fields)),
        }
    }

    diff
}

/// Full field set for a create, natural key included.
#[must_use]
pub fn create_fields(record: &CatalogRecord, fields: &FieldNames) -> Map<String, Value> {
    let mut map = update_fields(record, fields);
    map.insert(fields.identifier.clone(), Value::String(record.id.clone()));
    map
}

/// Replacement field set for an update. Optional catalog fields map to empty
/// strings so stale store values are cleared rather than left behind.
#[must_use]
pub fn update_fields(record: &CatalogRecord, fields: &FieldNames) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(fields.name.clone(), Value::String(record.name.clone()));
    map.insert(fields.form.clone(), Value::String(record.form.clone()));
    map.insert(fields.route.clone(), Value::String(record.route.clone()));
    map.insert(
        fields.manufacturer.clone(),
        Value::String(record.manufacturer.clone()),
    );
    map.insert(fields.link.clone(), Value::String(record.link.clone()));
    map.insert(
        fields.packaging.clone(),
        Value::String(record.packaging_code.clone().unwrap_or_default()),
    );
    map.insert(
        fields.conditions.clone(),
        Value::String(record.conditions.clone().unwrap_or_default()),
    );
    map.insert(
        fields.status.clone(),
        Value::String(record.status.as_str().to_string()),
    );
    map
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::DistributionStatus;
    use serde_json::json;

    fn catalog_record(id: &str) -> CatalogRecord {
        CatalogRecord {
            id: id.to_string(),
            name: format!("Product {id}"),
            form: "tablet".to_string(),
            route: "oral".to_string(),
            manufacturer: "Lab".to_string(),
            link: format!("https://registry.example.com/r/{id}"),
            packaging_code: None,
            conditions: None,
            status: DistributionStatus::NoInformation,
        }
    }

    fn remote_record(row_id: &str, key: &str) -> RemoteRecord {
        let mut fields = Map::new();
        fields.insert("Code CIS".to_string(), json!(key));
        RemoteRecord {
            id: row_id.to_string(),
            fields,
        }
    }

    // ==================== Diff Set Tests ====================

    #[test]
    fn test_diff_partitions_keys() {
        // Catalog {1,2,3} against store {2,3,4}.
        let catalog: BTreeMap<String, CatalogRecord> = ["1", "2", "3"]
            .into_iter()
            .map(|id| (id.to_string(), catalog_record(id)))
            .collect();
        let remote = vec![
            remote_record("recB", "2"),
            remote_record("recC", "3"),
            remote_record("recD", "4"),
        ];

        let diff = compute_diff(&catalog, &remote, &FieldNames::default());

        assert_eq!(diff.delete, ["recD"]);
        assert_eq!(diff.create.len(), 1);
        assert_eq!(diff.create[0].get("Code CIS").unwrap(), "1");
        let updated: Vec<&str> = diff
            .update
            .iter()
            .map(|u| u.record_id.as_str())
            .collect();
        assert_eq!(updated, ["recB", "recC"]);
    }

    #[test]
    fn test_update_payload_excludes_key_and_classification_fields() {
        let fields = FieldNames::default();
        let payload = update_fields(&catalog_record("1"), &fields);
        assert!(!payload.contains_key(&fields.identifier));
        assert!(!payload.contains_key(&fields.atc_code));
        assert!(!payload.contains_key(&fields.atc_level4));
        assert!(!payload.contains_key(&fields.atc_label));
        assert_eq!(payload.get(&fields.name).unwrap(), "Product 1");
    }

    #[test]
    fn test_create_payload_includes_key() {
        let fields = FieldNames::default();
        let payload = create_fields(&catalog_record("1"), &fields);
        assert_eq!(payload.get(&fields.identifier).unwrap(), "1");
    }

    #[test]
    fn test_optional_fields_map_to_empty_strings() {
        let fields = FieldNames::default();
        let payload = update_fields(&catalog_record("1"), &fields);
        assert_eq!(payload.get(&fields.packaging).unwrap(), "");
        assert_eq!(payload.get(&fields.conditions).unwrap(), "");
    }

    #[test]
    fn test_remote_row_without_key_is_deleted() {
        let catalog: BTreeMap<String, CatalogRecord> =
            [("1".to_string(), catalog_record("1"))].into();
        let keyless = RemoteRecord {
            id: "recX".to_string(),
            fields: Map::new(),
        };
        let diff = compute_diff(&catalog, &[keyless], &FieldNames::default());
        assert_eq!(diff.delete, ["recX"]);
        assert_eq!(diff.create.len(), 1);
        assert!(diff.update.is_empty());
    }

    #[test]
    fn test_duplicate_remote_key_is_deleted_once() {
        let catalog: BTreeMap<String, CatalogRecord> =
            [("1".to_string(), catalog_record("1"))].into();
        let remote = vec![remote_record("recA", "1"), remote_record("recB", "1")];
        let diff = compute_diff(&catalog, &remote, &FieldNames::default());
        assert_eq!(diff.delete, ["recB"]);
        assert_eq!(diff.update.len(), 1);
        assert_eq!(diff.update[0].record_id, "recA");
        assert!(diff.create.is_empty());
    }

    #[test]
    fn test_identical_sides_yield_updates_only() {
        let catalog: BTreeMap<String, CatalogRecord> =
            [("1".to_string(), catalog_record("1"))].into();
        let remote = vec![remote_record("recA", "1")];
        let diff = compute_diff(&catalog, &remote, &FieldNames::default());
        assert!(diff.delete.is_empty());
        assert!(diff.create.is_empty());
        assert_eq!(diff.update.len(), 1);
        assert!(!diff.is_empty());
    }
}
