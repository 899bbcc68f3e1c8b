//! Data shapes shared by the pipeline, the use cases and the store adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of the source table. `cells` is aligned with [`RawTable::columns`];
/// `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based data row number (the header is not counted)
    pub line: usize,
    pub cells: Vec<Option<String>>,
}

/// The whole source table as read from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }
}

/// A fully cleaned record, ready to be stored under `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanDocument {
    pub id: String,
    pub body: Map<String, Value>,
}

/// Name of a collection (index) in the document store. Always lowercase, so
/// `"Foo"` and `"foo"` address the same collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionName(String);

impl CollectionName {
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CollectionName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A single search result as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub index: String,
    pub id: String,
    pub score: Option<f64>,
    pub source: Map<String, Value>,
}

/// One bucket of a terms facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetBucket {
    pub key: String,
    pub doc_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Result of a delete-by-id call. Only `Deleted` counts as success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// Any other `result` string reported by the store
    Other(String),
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}

/// A row that was not submitted because it had no identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub line: usize,
    pub reason: String,
}

/// Summary of one ingestion pass.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub collection: String,
    pub columns: Vec<String>,
    pub excluded_column: Option<String>,
    pub indexed: usize,
    pub skipped: Vec<SkippedRow>,
    pub coerced_to_zero: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_are_lowercased() {
        assert_eq!(CollectionName::new("Foo"), CollectionName::new("foo"));
        assert_eq!(CollectionName::new(" Hash_John_Doe ").as_str(), "hash_john_doe");
    }

    #[test]
    fn only_deleted_counts_as_success() {
        assert!(DeleteOutcome::Deleted.is_deleted());
        assert!(!DeleteOutcome::NotFound.is_deleted());
        assert!(!DeleteOutcome::Other("noop".into()).is_deleted());
    }
}
