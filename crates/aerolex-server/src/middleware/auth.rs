//! API-key authentication middleware
//!
//! Every `/api` route requires the shared key in the `X-API-Key`
//! header. A missing or mismatched key yields 401 with the structured
//! error body.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::context::AppState;
use crate::error::AppError;

/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests without the configured API key.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if key == state.ctx.config.auth.api_key => Ok(next.run(request).await),
        Some(_) => Err(AppError::Unauthorized("Invalid API Key".to_string())),
        None => Err(AppError::Unauthorized("Missing API Key".to_string())),
    }
}
