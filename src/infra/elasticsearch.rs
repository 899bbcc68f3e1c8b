use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::app::ports::DocumentStorePort;
use crate::config::StoreConfig;
use crate::domain::{DeleteOutcome, FacetBucket, SearchHit};
use crate::error::{IndexerError, Result};

/// Name of the terms aggregation in facet requests
const FACET_AGGREGATION: &str = "facet";

/// Document store backed by the Elasticsearch REST API.
pub struct ElasticsearchStore {
    client: reqwest::Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticsearchStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| IndexerError::Config(format!("Invalid Elasticsearch URL '{}': {}", config.url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(IndexerError::Config(format!(
                "Elasticsearch URL '{}' cannot be used as a base URL",
                config.url
            )));
        }

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!(%method, %url, "Elasticsearch request");
        let builder = self.client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        builder.send().await.map_err(IndexerError::from_transport)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct FacetResponse {
    aggregations: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct BucketList {
    buckets: Vec<RawBucket>,
}

#[derive(Debug, Deserialize)]
struct RawBucket {
    key: Value,
    doc_count: u64,
}

/// Build an `Api` error from a non-success response, preferring the store's
/// own `error.type`/`error.reason` fields.
async fn api_error(resp: Response) -> IndexerError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    IndexerError::Api {
        status: status.as_u16(),
        reason: error_reason(status, &body),
    }
}

fn error_reason(status: StatusCode, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    match error {
        Some(Value::Object(e)) => {
            let kind = e.get("type").and_then(Value::as_str).unwrap_or("error");
            let reason = e.get("reason").and_then(Value::as_str).unwrap_or("");
            format!("{}: {}", kind, reason)
        }
        Some(Value::String(s)) => s.clone(),
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => status.canonical_reason().unwrap_or("unknown error").to_string(),
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        IndexerError::UnexpectedResponse(format!("{} (body: {})", e, preview))
    })
}

/// Read a successful JSON response, or turn the failure into an `Api` error.
async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    if !resp.status().is_success() {
        return Err(api_error(resp).await);
    }
    let body = resp.text().await.map_err(IndexerError::from_transport)?;
    parse_body(&body)
}

fn bucket_key(key: Value) -> String {
    match key {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl DocumentStorePort for ElasticsearchStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let resp = self.send(self.request(Method::HEAD, &[collection])).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(api_error(resp).await),
        }
    }

    async fn create_collection(&self, collection: &str) -> Result<()> {
        let resp = self.send(self.request(Method::PUT, &[collection])).await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(())
    }

    async fn index_document(&self, collection: &str, id: &str, body: &Map<String, Value>) -> Result<()> {
        let resp = self
            .send(self.request(Method::PUT, &[collection, "_doc", id]).json(body))
            .await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        debug!(collection, id, "Document indexed");
        Ok(())
    }

    async fn search_match(&self, collection: &str, field: &str, value: &str) -> Result<Vec<SearchHit>> {
        let query = json!({ "query": { "match": { field: value } } });
        let resp = self
            .send(self.request(Method::POST, &[collection, "_search"]).json(&query))
            .await?;
        let parsed: SearchResponse = read_json(resp).await?;

        Ok(parsed
            .hits
            .hits
            .into_iter()
            .map(|h| SearchHit {
                index: h.index,
                id: h.id,
                score: h.score,
                source: h.source,
            })
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let resp = self.send(self.request(Method::GET, &[collection, "_count"])).await?;
        let parsed: CountResponse = read_json(resp).await?;
        Ok(parsed.count)
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<DeleteOutcome> {
        let resp = self
            .send(self.request(Method::DELETE, &[collection, "_doc", id]))
            .await?;
        let status = resp.status();
        let body = resp.text().await.map_err(IndexerError::from_transport)?;

        // A missing document is a 404 carrying `"result": "not_found"`; a
        // missing index is a 404 carrying an `error` object instead.
        if status.is_success() || status == StatusCode::NOT_FOUND {
            if let Ok(parsed) = serde_json::from_str::<DeleteResponse>(&body) {
                return Ok(match parsed.result.as_str() {
                    "deleted" => DeleteOutcome::Deleted,
                    "not_found" => DeleteOutcome::NotFound,
                    other => DeleteOutcome::Other(other.to_string()),
                });
            }
        }
        Err(IndexerError::Api {
            status: status.as_u16(),
            reason: error_reason(status, &body),
        })
    }

    async fn terms_facet(&self, collection: &str, field: &str, size: u32) -> Result<Vec<FacetBucket>> {
        let query = json!({
            "size": 0,
            "aggs": { FACET_AGGREGATION: { "terms": { "field": field, "size": size } } }
        });
        let resp = self
            .send(self.request(Method::POST, &[collection, "_search"]).json(&query))
            .await?;
        let mut parsed: FacetResponse = read_json(resp).await?;

        let aggregation = parsed.aggregations.remove(FACET_AGGREGATION).ok_or_else(|| {
            IndexerError::UnexpectedResponse(format!("response has no '{}' aggregation", FACET_AGGREGATION))
        })?;
        let buckets: BucketList = serde_json::from_value(aggregation)?;

        Ok(buckets
            .buckets
            .into_iter()
            .map(|b| FacetBucket {
                key: bucket_key(b.key),
                doc_count: b.doc_count,
            })
            .collect())
    }
}
