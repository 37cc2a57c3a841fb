//! HTTP API surface
//!
//! A thin shell over the retrieval core: request validation, the
//! grounded query endpoint, collection statistics and liveness. The
//! `/api` routes sit behind the API-key middleware; rate limiting,
//! CORS and tracing are layered in `main`.

pub mod schemas;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::context::AppState;
use crate::error::AppError;
use crate::middleware::auth::require_api_key;
use schemas::{SearchRequest, SearchResponse, StatsResponse};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/search-regulations", post(search_regulations))
        .route("/stats", get(get_stats))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
        .with_state(state.clone());

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state)
        .nest("/api", protected)
}

/// Root endpoint: service identity.
async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "name": "Aerolex API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

/// Liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy"}))
}

/// Grounded search over the regulation corpus.
///
/// Cancellation propagates naturally: when the client goes away axum
/// drops this future, which aborts the in-flight oracle call instead
/// of attempting the downstream step.
async fn search_regulations(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let validated = request.validate()?;

    let outcome = state
        .ctx
        .rag
        .query(
            &validated.query,
            validated.date,
            Some(validated.limit),
            validated.score_threshold,
            validated.filter,
        )
        .await?;

    Ok(Json(outcome.into()))
}

/// Collection statistics.
async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let info = state.ctx.store.collection_info().await?;
    Ok(Json(info.into()))
}
