use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::app::ports::DocumentStorePort;
use crate::constants::KEYWORD_SUFFIX;
use crate::domain::{DeleteOutcome, FacetBucket, SearchHit};
use crate::error::{IndexerError, Result};

/// Default page size of a match query
const SEARCH_PAGE_SIZE: usize = 10;

type Collection = BTreeMap<String, Map<String, Value>>;

/// In-memory document store for development/testing.
///
/// Mirrors the store semantics the admin layer relies on: indexing creates
/// the collection on demand, operations on a missing collection fail with a
/// 404 `Api` error, and facets are computed over exact field values.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<Mutex<HashMap<String, Collection>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a stored document, if present.
    pub fn document(&self, collection: &str, id: &str) -> Option<Map<String, Value>> {
        self.lock().get(collection).and_then(|c| c.get(id)).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Collection>> {
        self.collections.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn no_such_index(collection: &str) -> IndexerError {
    IndexerError::Api {
        status: 404,
        reason: format!("index_not_found_exception: no such index [{}]", collection),
    }
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[async_trait]
impl DocumentStorePort for InMemoryDocumentStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.lock().contains_key(collection))
    }

    async fn create_collection(&self, collection: &str) -> Result<()> {
        let mut collections = self.lock();
        if collections.contains_key(collection) {
            return Err(IndexerError::Api {
                status: 400,
                reason: format!("resource_already_exists_exception: index [{}] already exists", collection),
            });
        }
        collections.insert(collection.to_string(), Collection::new());
        debug!("Created collection {}", collection);
        Ok(())
    }

    async fn index_document(&self, collection: &str, id: &str, body: &Map<String, Value>) -> Result<()> {
        self.lock()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), body.clone());
        Ok(())
    }

    async fn search_match(&self, collection: &str, field: &str, value: &str) -> Result<Vec<SearchHit>> {
        let collections = self.lock();
        let docs = collections.get(collection).ok_or_else(|| no_such_index(collection))?;
        let wanted = tokens(value);
        let field = field.strip_suffix(KEYWORD_SUFFIX).unwrap_or(field);

        let mut hits: Vec<SearchHit> = docs
            .iter()
            .filter_map(|(id, source)| {
                let text = source.get(field).and_then(field_text)?;
                let matched = tokens(&text).intersection(&wanted).count();
                (matched > 0).then(|| SearchHit {
                    index: collection.to_string(),
                    id: id.clone(),
                    score: Some(matched as f64),
                    source: source.clone(),
                })
            })
            .collect();

        // Highest score first; ties keep id order from the BTreeMap
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(SEARCH_PAGE_SIZE);
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        self.lock()
            .get(collection)
            .map(|docs| docs.len() as u64)
            .ok_or_else(|| no_such_index(collection))
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<DeleteOutcome> {
        let mut collections = self.lock();
        let docs = collections.get_mut(collection).ok_or_else(|| no_such_index(collection))?;
        Ok(match docs.remove(id) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }

    async fn terms_facet(&self, collection: &str, field: &str, size: u32) -> Result<Vec<FacetBucket>> {
        let collections = self.lock();
        let docs = collections.get(collection).ok_or_else(|| no_such_index(collection))?;
        let field = field.strip_suffix(KEYWORD_SUFFIX).unwrap_or(field);

        let mut counts: HashMap<String, u64> = HashMap::new();
        for source in docs.values() {
            if let Some(key) = source.get(field).and_then(field_text) {
                *counts.entry(key).or_default() += 1;
            }
        }

        let mut buckets: Vec<FacetBucket> = counts
            .into_iter()
            .map(|(key, doc_count)| FacetBucket { key, doc_count })
            .collect();
        buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count).then_with(|| a.key.cmp(&b.key)));
        buckets.truncate(size as usize);
        Ok(buckets)
    }
}
