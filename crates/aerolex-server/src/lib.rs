//! Aerolex Server Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Temporally-aware retrieval service over Brazilian civil-aviation
//! regulations.
//!
//! # Overview
//!
//! - **Store**: vector store adapter (collection management, batched
//!   upserts, semantic and point-in-time search)
//! - **Oracles**: HTTP clients for the embedding and LLM services
//! - **Ingestion**: parse → chunk → embed → upsert pipeline with the
//!   supersession protocol and a resumable processing log
//! - **Search**: retrieval plus grounded answer synthesis
//! - **API**: query and stats endpoints behind API-key auth, CORS and
//!   per-client rate limiting
//!
//! # Architecture
//!
//! Configuration is loaded once into an immutable [`config::Config`];
//! every long-lived service (store client, oracle clients, RAG
//! pipeline) lives in the [`context::AppContext`] built at startup and
//! passed through. The ingestion path and the query path share the
//! store; the store is the single source of durable state.
//!
//! # Example
//!
//! ```no_run
//! use aerolex_server::{api, config::Config, context::AppContext};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let state = AppContext::build(config)?;
//!     let app = api::router(state);
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod ingest;
pub mod middleware;
pub mod oracle;
pub mod search;
pub mod store;

// Re-export commonly used types
pub use error::{AppError, ServerResult};
