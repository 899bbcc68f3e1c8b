//! Fake Elasticsearch REST API for adapter tests.
//!
//! Spins up a minimal `axum` server on a random port bound to 127.0.0.1.
//! Serves the handful of endpoints the store adapter calls:
//! - `HEAD /{index}`, `PUT /{index}`
//! - `PUT /{index}/_doc/{id}`, `DELETE /{index}/_doc/{id}`
//! - `POST /{index}/_search` (match query or terms aggregation)
//! - `GET /{index}/_count`
//!
//! Every request's `Authorization` header is recorded so tests can check the
//! credentials the adapter sends.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct FakeState {
    indices: HashMap<String, BTreeMap<String, Value>>,
    authorization: Vec<Option<String>>,
}

type Shared = Arc<Mutex<FakeState>>;
type Reply = (StatusCode, Json<Value>);

/// Handle to the running fake server.
pub struct FakeElasticsearch {
    addr: SocketAddr,
    state: Shared,
}

impl FakeElasticsearch {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));

        let app = Router::new()
            .route("/:index", put(create_index).head(index_exists))
            .route("/:index/_doc/:id", put(index_document).delete(delete_document))
            .route("/:index/_search", post(search))
            .route("/:index/_count", get(count))
            .with_state(state.clone());

        let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(app.into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// `Authorization` header of every request received so far.
    pub async fn authorization_headers(&self) -> Vec<Option<String>> {
        self.state.lock().await.authorization.clone()
    }

    pub async fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.state.lock().await.indices.get(index).and_then(|docs| docs.get(id)).cloned()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

fn record(state: &mut FakeState, headers: &HeaderMap) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    state.authorization.push(auth);
}

fn no_such_index(index: &str) -> Reply {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": {
                "root_cause": [{ "type": "index_not_found_exception", "reason": format!("no such index [{}]", index) }],
                "type": "index_not_found_exception",
                "reason": format!("no such index [{}]", index),
                "index": index
            },
            "status": 404
        })),
    )
}

async fn index_exists(State(state): State<Shared>, Path(index): Path<String>, headers: HeaderMap) -> StatusCode {
    let mut state = state.lock().await;
    record(&mut state, &headers);
    if state.indices.contains_key(&index) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn create_index(State(state): State<Shared>, Path(index): Path<String>, headers: HeaderMap) -> Reply {
    let mut state = state.lock().await;
    record(&mut state, &headers);
    if state.indices.contains_key(&index) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": {
                    "type": "resource_already_exists_exception",
                    "reason": format!("index [{}] already exists", index)
                },
                "status": 400
            })),
        );
    }
    state.indices.insert(index.clone(), BTreeMap::new());
    (
        StatusCode::OK,
        Json(json!({ "acknowledged": true, "shards_acknowledged": true, "index": index })),
    )
}

async fn index_document(
    State(state): State<Shared>,
    Path((index, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut state = state.lock().await;
    record(&mut state, &headers);
    let previous = state.indices.entry(index.clone()).or_default().insert(id.clone(), body);
    let (status, result) = match previous {
        Some(_) => (StatusCode::OK, "updated"),
        None => (StatusCode::CREATED, "created"),
    };
    (status, Json(json!({ "_index": index, "_id": id, "result": result })))
}

async fn delete_document(
    State(state): State<Shared>,
    Path((index, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Reply {
    let mut state = state.lock().await;
    record(&mut state, &headers);
    let Some(docs) = state.indices.get_mut(&index) else {
        return no_such_index(&index);
    };
    match docs.remove(&id) {
        Some(_) => (StatusCode::OK, Json(json!({ "_index": index, "_id": id, "result": "deleted" }))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "_index": index, "_id": id, "result": "not_found" })),
        ),
    }
}

async fn search(
    State(state): State<Shared>,
    Path(index): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut state = state.lock().await;
    record(&mut state, &headers);
    let Some(docs) = state.indices.get(&index) else {
        return no_such_index(&index);
    };

    if let Some(field) = body.pointer("/aggs/facet/terms/field").and_then(Value::as_str) {
        let field = field.trim_end_matches(".keyword");
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for doc in docs.values() {
            if let Some(key) = doc.get(field).and_then(Value::as_str) {
                *counts.entry(key.to_string()).or_default() += 1;
            }
        }
        let mut buckets: Vec<(String, u64)> = counts.into_iter().collect();
        buckets.sort_by(|a, b| b.1.cmp(&a.1));
        let buckets: Vec<Value> = buckets
            .into_iter()
            .map(|(key, doc_count)| json!({ "key": key, "doc_count": doc_count }))
            .collect();
        return (
            StatusCode::OK,
            Json(json!({
                "hits": { "total": { "value": docs.len() }, "hits": [] },
                "aggregations": { "facet": { "doc_count_error_upper_bound": 0, "buckets": buckets } }
            })),
        );
    }

    let Some((field, wanted)) = body
        .pointer("/query/match")
        .and_then(Value::as_object)
        .and_then(|m| m.iter().next())
        .map(|(f, v)| (f.clone(), v.as_str().unwrap_or_default().to_lowercase()))
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "type": "parsing_exception", "reason": "unsupported query" }, "status": 400 })),
        );
    };

    let hits: Vec<Value> = docs
        .iter()
        .filter(|(_, doc)| {
            doc.get(&field)
                .and_then(Value::as_str)
                .map(|v| v.to_lowercase() == wanted)
                .unwrap_or(false)
        })
        .map(|(id, doc)| json!({ "_index": index, "_id": id, "_score": 1.0, "_source": doc }))
        .collect();

    (
        StatusCode::OK,
        Json(json!({ "hits": { "total": { "value": hits.len() }, "max_score": 1.0, "hits": hits } })),
    )
}

async fn count(State(state): State<Shared>, Path(index): Path<String>, headers: HeaderMap) -> Reply {
    let mut state = state.lock().await;
    record(&mut state, &headers);
    match state.indices.get(&index) {
        Some(docs) => (StatusCode::OK, Json(json!({ "count": docs.len() }))),
        None => no_such_index(&index),
    }
}
