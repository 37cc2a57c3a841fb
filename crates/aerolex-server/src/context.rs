//! Application context
//!
//! All shared services live in one immutable context constructed at
//! startup and passed through handlers. No module-level state exists
//! anywhere in the crate.

use std::sync::Arc;

use aerolex_ingest::pdf::acquire::DisabledOcr;
use aerolex_ingest::{Chunker, LexmlParser, PdfParser, TemporalExtractor};

use crate::config::Config;
use crate::ingest::{IngestionPipeline, VersionManager};
use crate::oracle::{HttpEmbeddingClient, OllamaClient};
use crate::search::rag::RagPipeline;
use crate::search::VectorSearch;
use crate::store::QdrantStore;

/// Long-lived shared services.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<QdrantStore>,
    pub rag: RagPipeline,
}

/// Cloneable handle handed to axum.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<AppContext>,
}

impl AppContext {
    /// Wire up the query-path services from configuration.
    pub fn build(config: Config) -> anyhow::Result<AppState> {
        let store = Arc::new(QdrantStore::new(config.store.clone())?);
        let embedder = Arc::new(HttpEmbeddingClient::new(config.embedding.clone())?);
        let llm = Arc::new(OllamaClient::new(config.llm.clone())?);

        let search = VectorSearch::new(store.clone(), embedder, config.search.clone());
        let rag = RagPipeline::new(search, llm);

        Ok(AppState {
            ctx: Arc::new(AppContext { config, store, rag }),
        })
    }
}

/// Wire up the ingestion-path services from configuration.
///
/// OCR stays an external oracle: deployments with scanned sources plug
/// their recognizer in through
/// [`OcrOracle`](aerolex_ingest::pdf::acquire::OcrOracle); the bundled
/// build skips image-only pages.
pub fn build_ingestion_pipeline(config: &Config) -> anyhow::Result<(IngestionPipeline, Arc<QdrantStore>)> {
    if config.ingestion.ocr_enabled {
        tracing::warn!(
            language = %config.ingestion.ocr_language,
            "ENABLE_OCR is set but no OCR oracle is wired in this build; image-only pages are skipped"
        );
    }

    let store = Arc::new(QdrantStore::new(config.store.clone())?);
    let embedder = Arc::new(HttpEmbeddingClient::new(config.embedding.clone())?);
    let versions = Arc::new(VersionManager::new(store.clone()));

    let pipeline = IngestionPipeline::new(
        Arc::new(LexmlParser::new(TemporalExtractor::new(
            config.chunking.default_effective_days,
        ))),
        Arc::new(PdfParser::new(
            TemporalExtractor::new(config.chunking.default_effective_days),
            Box::new(DisabledOcr),
        )),
        Chunker::new(config.chunking.max_tokens, config.chunking.overlap),
        embedder,
        versions,
        config.ingestion.parallelism,
    );

    Ok((pipeline, store))
}
