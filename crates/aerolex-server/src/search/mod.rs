//! Retrieval: semantic and temporal vector search

pub mod rag;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use aerolex_common::Result;

use crate::config::SearchConfig;
use crate::oracle::EmbeddingOracle;
use crate::store::{Filter, QdrantStore, ScoredPoint};

/// One retrieved chunk with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub regulation_id: String,
    pub text: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    pub metadata: Value,
}

impl SearchHit {
    fn from_point(point: ScoredPoint) -> Self {
        let payload = point.payload;
        let text_field = |key: &str| {
            payload
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        SearchHit {
            regulation_id: text_field("regulation_id").unwrap_or_default(),
            text: text_field("text").unwrap_or_default(),
            score: point.score,
            version: text_field("version"),
            effective_date: text_field("effective_date"),
            expiry_date: text_field("expiry_date"),
            metadata: payload
                .get("metadata")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default())),
        }
    }
}

/// Vector search with temporal and semantic filtering.
pub struct VectorSearch {
    store: Arc<QdrantStore>,
    embedder: Arc<dyn EmbeddingOracle>,
    defaults: SearchConfig,
}

impl VectorSearch {
    pub fn new(
        store: Arc<QdrantStore>,
        embedder: Arc<dyn EmbeddingOracle>,
        defaults: SearchConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            defaults,
        }
    }

    /// Semantic search over the whole corpus.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        score_threshold: Option<f32>,
        filter: Option<Filter>,
    ) -> Result<Vec<SearchHit>> {
        let vector = self.embedder.embed_one(query).await?;
        let hits = self
            .store
            .search(
                &vector,
                limit.unwrap_or(self.defaults.top_k),
                score_threshold.unwrap_or(self.defaults.score_threshold),
                filter.as_ref(),
            )
            .await?;

        info!(hits = hits.len(), query = preview(query), "Search completed");
        Ok(hits.into_iter().map(SearchHit::from_point).collect())
    }

    /// Semantic search restricted to chunks in force on `date`.
    pub async fn search_temporal(
        &self,
        query: &str,
        date: NaiveDate,
        limit: Option<usize>,
        score_threshold: Option<f32>,
        extra: Option<Filter>,
    ) -> Result<Vec<SearchHit>> {
        let vector = self.embedder.embed_one(query).await?;
        let hits = self
            .store
            .search_temporal(
                &vector,
                date,
                limit.unwrap_or(self.defaults.top_k),
                score_threshold.unwrap_or(self.defaults.score_threshold),
                extra,
            )
            .await?;

        info!(
            hits = hits.len(),
            %date,
            query = preview(query),
            "Temporal search completed"
        );
        Ok(hits.into_iter().map(SearchHit::from_point).collect())
    }
}

/// First characters of a query for log lines.
fn preview(query: &str) -> String {
    let mut end = query.len().min(50);
    while !query.is_char_boundary(end) {
        end -= 1;
    }
    query[..end].to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hit_from_point() {
        let point = ScoredPoint {
            id: json!("0a2e9b2e-5df1-4f34-9a5c-000000000001"),
            score: 0.87,
            payload: json!({
                "regulation_id": "8666-art3-chunk-0",
                "text": "Art. 3º ...",
                "version": "1993-06-21",
                "effective_date": "1993-09-19",
                "metadata": {"doc_kind": "lei"},
            }),
        };

        let hit = SearchHit::from_point(point);
        assert_eq!(hit.regulation_id, "8666-art3-chunk-0");
        assert_eq!(hit.version.as_deref(), Some("1993-06-21"));
        assert_eq!(hit.effective_date.as_deref(), Some("1993-09-19"));
        assert_eq!(hit.expiry_date, None);
        assert_eq!(hit.metadata["doc_kind"], "lei");
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let query = "ç".repeat(60);
        let p = preview(&query);
        assert!(p.len() <= 50);
        assert!(query.starts_with(&p));
    }
}
