//! Request and response schemas for the query API

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::search::rag::RagOutcome;
use crate::search::SearchHit;
use crate::store::{CollectionInfo, Filter};

/// Longest accepted query, in characters.
pub const MAX_QUERY_CHARS: usize = 1000;

/// Largest accepted `limit`.
pub const MAX_LIMIT: usize = 50;

/// Default number of sources when the request leaves `limit` out.
pub const DEFAULT_LIMIT: usize = 5;

/// Search request body.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,

    /// Target date (ISO format: YYYY-MM-DD)
    #[serde(default)]
    pub date: Option<String>,

    /// Number of sources to retrieve
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Minimum similarity score
    #[serde(default)]
    pub score_threshold: Option<f32>,

    /// Additional equality filters on payload fields
    #[serde(default)]
    pub filters: Option<serde_json::Map<String, serde_json::Value>>,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedSearch {
    pub query: String,
    pub date: Option<NaiveDate>,
    pub limit: usize,
    pub score_threshold: Option<f32>,
    pub filter: Option<Filter>,
}

impl SearchRequest {
    /// Validate field by field; the first offending field is reported
    /// in the error.
    pub fn validate(self) -> Result<ValidatedSearch, AppError> {
        let query = self.query.trim().to_string();
        if query.is_empty() {
            return Err(AppError::validation("query", "must not be empty"));
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(AppError::validation(
                "query",
                format!("must not exceed {MAX_QUERY_CHARS} characters"),
            ));
        }

        if self.limit < 1 || self.limit > MAX_LIMIT {
            return Err(AppError::validation(
                "limit",
                format!("must be within 1..={MAX_LIMIT}"),
            ));
        }

        if let Some(threshold) = self.score_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(AppError::validation(
                    "score_threshold",
                    "must be within 0.0..=1.0",
                ));
            }
        }

        let date = match &self.date {
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    AppError::validation("date", "must be an ISO date (YYYY-MM-DD)")
                })?,
            ),
            None => None,
        };

        let filter = self
            .filters
            .as_ref()
            .filter(|m| !m.is_empty())
            .map(Filter::from_user_filters);

        Ok(ValidatedSearch {
            query,
            date,
            limit: self.limit,
            score_threshold: self.score_threshold,
            filter,
        })
    }
}

/// Search response body.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub answer: String,
    pub sources: Vec<SearchHit>,
    pub search_time_ms: u64,
    pub llm_time_ms: u64,
    pub total_time_ms: u64,
}

impl From<RagOutcome> for SearchResponse {
    fn from(outcome: RagOutcome) -> Self {
        SearchResponse {
            answer: outcome.answer,
            sources: outcome.sources,
            search_time_ms: outcome.search_time_ms,
            llm_time_ms: outcome.llm_time_ms,
            total_time_ms: outcome.total_time_ms,
        }
    }
}

/// Stats response body.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub vectors_count: u64,
    pub points_count: u64,
    pub status: String,
}

impl From<CollectionInfo> for StatsResponse {
    fn from(info: CollectionInfo) -> Self {
        StatsResponse {
            vectors_count: info.vectors_count,
            points_count: info.points_count,
            status: info.status,
        }
    }
}
