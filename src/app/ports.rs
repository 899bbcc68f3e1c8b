use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::{DeleteOutcome, FacetBucket, SearchHit};
use crate::error::Result;

/// Operations the admin tool needs from the external document store.
///
/// Collection names arrive already lowercased. Every call is a single request;
/// implementations do not retry.
#[async_trait]
pub trait DocumentStorePort: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    async fn create_collection(&self, collection: &str) -> Result<()>;

    /// Store `body` under `id`, replacing any existing document with that id.
    async fn index_document(&self, collection: &str, id: &str, body: &Map<String, Value>) -> Result<()>;

    /// Full-text `match` of `value` against `field`.
    async fn search_match(&self, collection: &str, field: &str, value: &str) -> Result<Vec<SearchHit>>;

    async fn count(&self, collection: &str) -> Result<u64>;

    async fn delete_document(&self, collection: &str, id: &str) -> Result<DeleteOutcome>;

    /// Size-0 terms aggregation on the exact-match `field`.
    async fn terms_facet(&self, collection: &str, field: &str, size: u32) -> Result<Vec<FacetBucket>>;
}
