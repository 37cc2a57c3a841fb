//! Vector store adapter (qdrant REST API)
//!
//! Collection management, payload indexing, batched upserts, semantic
//! and temporal search, scroll and introspection, behind one typed
//! client.
//!
//! The client is `Clone`-cheap and thread-safe; all writes the adapter
//! reports successful were acknowledged with `wait=true`, so a
//! following read observes them.

use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use aerolex_common::{AerolexError, Result};

use super::filter::Filter;
use crate::config::StoreConfig;

/// Page size used when scrolling a whole version group.
const SCROLL_PAGE_SIZE: usize = 256;

/// A point ready for upsert.
#[derive(Debug, Clone, Serialize)]
pub struct PointRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// A search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub id: Value,
    pub score: f32,
    #[serde(default)]
    pub payload: Value,
}

/// A point returned by scroll (payload plus optional vector).
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievedPoint {
    pub id: Value,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
}

/// Collection statistics for the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    #[serde(default)]
    pub vectors_count: u64,
    #[serde(default)]
    pub points_count: u64,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SearchResult(Vec<ScoredPoint>);

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<RetrievedPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

/// Typed client for the vector store's HTTP API.
#[derive(Clone)]
pub struct QdrantStore {
    http: reqwest::Client,
    base_url: String,
    config: StoreConfig,
}

impl QdrantStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|_| AerolexError::Config("store API key is not a valid header".into()))?;
            headers.insert("api-key", value);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| AerolexError::Store(format!("failed to build store client: {e}")))?;

        Ok(Self {
            base_url: config.base_url(),
            http,
            config,
        })
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    fn url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.base_url, self.config.collection, suffix
        )
    }

    /// Create the collection (cosine distance, configured HNSW graph)
    /// and its payload indexes. Returns false when it already existed.
    pub async fn ensure_collection(&self, dimension: usize, recreate: bool) -> Result<bool> {
        let exists = self.collection_exists().await?;
        if exists && !recreate {
            info!(collection = self.collection(), "Collection already exists");
            return Ok(false);
        }
        if exists && recreate {
            warn!(collection = self.collection(), "Recreating existing collection");
            self.send(self.http.delete(self.url(""))).await?;
        }

        let body = json!({
            "vectors": {
                "size": dimension,
                "distance": "Cosine",
            },
            "hnsw_config": {
                "m": self.config.hnsw_m,
                "ef_construct": self.config.hnsw_ef_construct,
            },
        });
        self.send(self.http.put(self.url("")).json(&body)).await?;
        info!(
            collection = self.collection(),
            dimension, "Created collection"
        );

        self.create_payload_indexes().await;
        Ok(true)
    }

    async fn collection_exists(&self) -> Result<bool> {
        let response = self
            .http
            .get(self.url(""))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(AerolexError::Store(format!(
                "unexpected status {status} checking collection"
            ))),
        }
    }

    /// Indexes on the fields every query filters by. Failures are
    /// logged and skipped; an index can be created again later.
    async fn create_payload_indexes(&self) {
        let indexes = [
            ("effective_date", "datetime"),
            ("expiry_date", "datetime"),
            ("status", "keyword"),
            ("regulation_id", "keyword"),
            ("version", "keyword"),
            ("metadata.category", "keyword"),
            ("metadata.doc_kind", "keyword"),
            ("metadata.doc_number", "keyword"),
        ];

        for (field, schema) in indexes {
            let body = json!({"field_name": field, "field_schema": schema});
            let request = self.http.put(self.url("/index?wait=true")).json(&body);
            match self.send(request).await {
                Ok(_) => debug!(field, "Created payload index"),
                Err(e) => warn!(field, error = %e, "Could not create payload index"),
            }
        }
    }

    /// Upsert points in sub-batches. Idempotent on id; a batch this
    /// returns Ok for was fully acknowledged by the store.
    pub async fn upsert(&self, points: &[PointRecord]) -> Result<()> {
        for batch in points.chunks(self.config.upsert_batch_size.max(1)) {
            let body = json!({"points": batch});
            self.send(self.http.put(self.url("/points?wait=true")).json(&body))
                .await?;
            debug!(count = batch.len(), "Upserted point batch");
        }
        Ok(())
    }

    /// Semantic search ordered by descending cosine similarity.
    pub async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        score_threshold: f32,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScoredPoint>> {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "score_threshold": score_threshold,
            "with_payload": true,
            "params": {"hnsw_ef": self.config.hnsw_ef_search},
        });
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            body["filter"] = serde_json::to_value(filter)?;
        }

        let envelope: ApiEnvelope<SearchResult> = self
            .send_json(self.http.post(self.url("/points/search")).json(&body))
            .await?;
        let hits = envelope.result.map(|r| r.0).unwrap_or_default();
        debug!(hits = hits.len(), "Search returned");
        Ok(hits)
    }

    /// Temporal semantic search: same ordering, candidate set
    /// restricted to points in force on `date`.
    pub async fn search_temporal(
        &self,
        vector: &[f32],
        date: chrono::NaiveDate,
        limit: usize,
        score_threshold: f32,
        extra: Option<Filter>,
    ) -> Result<Vec<ScoredPoint>> {
        let filter = Filter::temporal(date, extra);
        self.search(vector, limit, score_threshold, Some(&filter))
            .await
    }

    /// Fetch every point matching `filter`, following scroll pages.
    pub async fn scroll_all(
        &self,
        filter: &Filter,
        with_vectors: bool,
    ) -> Result<Vec<RetrievedPoint>> {
        let mut points = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "filter": filter,
                "limit": SCROLL_PAGE_SIZE,
                "with_payload": true,
                "with_vector": with_vectors,
            });
            if let Some(offset) = &offset {
                body["offset"] = offset.clone();
            }

            let envelope: ApiEnvelope<ScrollResult> = self
                .send_json(self.http.post(self.url("/points/scroll")).json(&body))
                .await?;
            let Some(mut page) = envelope.result else {
                break;
            };
            points.append(&mut page.points);
            match page.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        Ok(points)
    }

    /// Collection statistics.
    pub async fn collection_info(&self) -> Result<CollectionInfo> {
        let envelope: ApiEnvelope<CollectionInfo> =
            self.send_json(self.http.get(self.url(""))).await?;
        envelope
            .result
            .ok_or_else(|| AerolexError::Store("collection info missing from response".into()))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AerolexError::Store(format!(
                "store returned {status}: {body}"
            )));
        }
        Ok(response)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| AerolexError::Store(format!("malformed store response: {e}")))
    }

    fn transport_error(&self, e: reqwest::Error) -> AerolexError {
        if e.is_timeout() {
            AerolexError::Store(format!(
                "store request timed out after {}s",
                self.config.timeout_secs
            ))
        } else {
            AerolexError::Store(format!("store request failed: {e}"))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::filter::Condition;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer, batch_size: usize) -> QdrantStore {
        let config = StoreConfig {
            host: server.uri(),
            port: 6333,
            collection: "aviation_regulations".to_string(),
            api_key: None,
            hnsw_m: 16,
            hnsw_ef_construct: 100,
            hnsw_ef_search: 64,
            upsert_batch_size: batch_size,
            timeout_secs: 5,
        };
        QdrantStore::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_search_parses_hits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/aviation_regulations/points/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {"id": "0a2e9b2e-5df1-4f34-9a5c-000000000001", "score": 0.91,
                     "payload": {"regulation_id": "1234-art5-chunk-0", "text": "Art. 5º ..."}},
                ],
                "status": "ok",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, 100);
        let hits = store.search(&[0.1, 0.2], 5, 0.7, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 0.91).abs() < 1e-6);
        assert_eq!(hits[0].payload["regulation_id"], "1234-art5-chunk-0");
    }

    #[tokio::test]
    async fn test_temporal_search_sends_composite_filter() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/aviation_regulations/points/search"))
            .and(body_partial_json(json!({
                "filter": {
                    "should": [
                        {"must": [
                            {"key": "status", "match": {"value": "active"}},
                            {"key": "effective_date", "range": {"lte": "2022-07-01"}},
                            {"should": [
                                {"key": "expiry_date", "range": {"gte": "2022-07-01"}},
                                {"is_null": {"key": "expiry_date"}},
                            ]},
                        ]},
                        {"must": [
                            {"key": "status", "match": {"value": "superseded"}},
                            {"key": "effective_date", "range": {"lte": "2022-07-01"}},
                            {"key": "expiry_date", "range": {"gt": "2022-07-01"}},
                        ]},
                    ],
                },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, 100);
        let date = chrono::NaiveDate::from_ymd_opt(2022, 7, 1).unwrap();
        let hits = store
            .search_temporal(&[0.5], date, 5, 0.7, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_splits_into_sub_batches() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/collections/aviation_regulations/points"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"status": "acknowledged"}})))
            .expect(3)
            .mount(&server)
            .await;

        let store = store_for(&server, 2);
        let points: Vec<PointRecord> = (0u64..5)
            .map(|i| PointRecord {
                id: Uuid::from_u128(u128::from(i)),
                vector: vec![0.0; 4],
                payload: json!({"chunk_index": i}),
            })
            .collect();
        store.upsert(&points).await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_error_surfaces_as_store_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/collections/aviation_regulations/points"))
            .respond_with(ResponseTemplate::new(500).set_body_string("wal failure"))
            .mount(&server)
            .await;

        let store = store_for(&server, 100);
        let points = vec![PointRecord {
            id: Uuid::from_u128(7),
            vector: vec![0.0],
            payload: json!({}),
        }];
        let err = store.upsert(&points).await.unwrap_err();
        assert_eq!(err.kind(), "store_error");
        assert!(err.to_string().contains("wal failure"));
    }

    #[tokio::test]
    async fn test_scroll_follows_pages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/aviation_regulations/points/scroll"))
            .and(body_partial_json(json!({"offset": "page-2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"points": [{"id": 2, "payload": {"v": 2}}], "next_page_offset": null},
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/collections/aviation_regulations/points/scroll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"points": [{"id": 1, "payload": {"v": 1}}], "next_page_offset": "page-2"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, 100);
        let filter = Filter::all(vec![Condition::matches("status", "active")]);
        let points = store.scroll_all(&filter, false).await.unwrap();
        assert_eq!(points.len(), 2);
    }

    #[tokio::test]
    async fn test_collection_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/aviation_regulations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"status": "green", "vectors_count": 1200, "points_count": 1200},
            })))
            .mount(&server)
            .await;

        let store = store_for(&server, 100);
        let info = store.collection_info().await.unwrap();
        assert_eq!(info.vectors_count, 1200);
        assert_eq!(info.status, "green");
    }

    #[tokio::test]
    async fn test_ensure_collection_creates_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/aviation_regulations"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/aviation_regulations"))
            .and(body_partial_json(json!({
                "vectors": {"size": 1024, "distance": "Cosine"},
                "hnsw_config": {"m": 16, "ef_construct": 100},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/aviation_regulations/index"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .mount(&server)
            .await;

        let store = store_for(&server, 100);
        let created = store.ensure_collection(1024, false).await.unwrap();
        assert!(created);
    }
}
