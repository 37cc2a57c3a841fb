//! Ingestion pipeline
//!
//! Per source file: pick the parser by extension, run units through the
//! chunker, batch chunk texts into the embedding oracle, and hand the
//! points to the version manager (which writes them and applies
//! supersession). Sources are parsed concurrently up to the configured
//! parallelism; one failing source never aborts the rest of the batch.

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use aerolex_common::types::{Chunk, RegulatoryUnit};
use aerolex_common::{AerolexError, Result};
use aerolex_ingest::{Chunker, LexmlParser, PdfParser};

use super::log::IngestionLog;
use super::versioning::VersionManager;
use crate::oracle::EmbeddingOracle;
use crate::store::PointRecord;

/// Outcome of one ingestion run.
#[derive(Debug, Default)]
pub struct IngestionSummary {
    pub processed: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub skipped: usize,
    pub chunks_ingested: usize,
    pub points_superseded: usize,
}

/// Coordinator gluing parsers, chunker, embedding oracle and store.
pub struct IngestionPipeline {
    lexml: Arc<LexmlParser>,
    pdf: Arc<PdfParser>,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingOracle>,
    versions: Arc<VersionManager>,
    parallelism: usize,
}

impl IngestionPipeline {
    pub fn new(
        lexml: Arc<LexmlParser>,
        pdf: Arc<PdfParser>,
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingOracle>,
        versions: Arc<VersionManager>,
        parallelism: usize,
    ) -> Self {
        Self {
            lexml,
            pdf,
            chunker,
            embedder,
            versions,
            parallelism: parallelism.max(1),
        }
    }

    /// Ingest a batch of source files, skipping those the log already
    /// records as processed. The log is updated and saved afterwards.
    pub async fn ingest_paths(
        &self,
        paths: Vec<PathBuf>,
        log: &mut IngestionLog,
    ) -> IngestionSummary {
        let mut summary = IngestionSummary::default();

        let pending: Vec<PathBuf> = paths
            .into_iter()
            .filter(|p| {
                let done = log.is_processed(&p.display().to_string());
                if done {
                    summary.skipped += 1;
                }
                !done
            })
            .collect();

        info!(
            pending = pending.len(),
            skipped = summary.skipped,
            "Starting ingestion run"
        );

        let results: Vec<(String, Result<SourceStats>)> = stream::iter(pending)
            .map(|path| async move {
                let name = path.display().to_string();
                let result = self.ingest_source(&path).await;
                (name, result)
            })
            .buffer_unordered(self.parallelism)
            .collect()
            .await;

        for (source, result) in results {
            match result {
                Ok(stats) => {
                    summary.chunks_ingested += stats.chunks;
                    summary.points_superseded += stats.superseded;
                    log.mark_processed(&source);
                    summary.processed.push(source);
                },
                Err(e) => {
                    warn!(source, error = %e, "Source failed");
                    log.mark_failed(&source, e.to_string());
                    summary.failed.push((source, e.to_string()));
                },
            }
        }

        if let Err(e) = log.save() {
            warn!(error = %e, "Could not save ingestion log");
        }

        info!(
            processed = summary.processed.len(),
            failed = summary.failed.len(),
            chunks = summary.chunks_ingested,
            superseded = summary.points_superseded,
            "Ingestion run finished"
        );
        summary
    }

    /// Parse → chunk → embed → version-managed upsert for one file.
    async fn ingest_source(&self, path: &Path) -> Result<SourceStats> {
        let units = self.parse_units(path).await?;
        if units.is_empty() {
            return Ok(SourceStats::default());
        }

        let chunks: Vec<Chunk> = units.iter().flat_map(|u| self.chunker.chunk_unit(u)).collect();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let points: Vec<PointRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                Ok(PointRecord {
                    id: chunk.id,
                    vector,
                    payload: serde_json::to_value(chunk)?,
                })
            })
            .collect::<Result<_>>()?;

        let document = &units[0].document;
        // The version's force date is the earliest across its chunks.
        let new_effective = chunks.iter().filter_map(|c| c.effective_date).min();
        let new_version = chunks
            .first()
            .map(|c| c.version.clone())
            .unwrap_or_else(|| "unversioned".to_string());

        let outcome = self
            .versions
            .ingest_document(
                document.kind.as_str(),
                &document.number,
                &new_version,
                new_effective,
                points,
            )
            .await?;

        info!(
            source = %path.display(),
            units = units.len(),
            chunks = chunks.len(),
            superseded = outcome.superseded_points,
            "Source ingested"
        );

        Ok(SourceStats {
            chunks: chunks.len(),
            superseded: outcome.superseded_points,
        })
    }

    /// CPU-bound parsing runs on the blocking pool.
    async fn parse_units(&self, path: &Path) -> Result<Vec<RegulatoryUnit>> {
        let is_xml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("xml"))
            .unwrap_or(false);

        let lexml = self.lexml.clone();
        let pdf = self.pdf.clone();
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            if is_xml {
                lexml.parse_file(&path)
            } else {
                pdf.parse_file(&path)
            }
        })
        .await
        .map_err(|e| AerolexError::Parse(format!("parser task panicked: {e}")))?
    }
}

#[derive(Debug, Default)]
struct SourceStats {
    chunks: usize,
    superseded: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::store::QdrantStore;
    use aerolex_ingest::pdf::acquire::DisabledOcr;
    use aerolex_ingest::TemporalExtractor;
    use async_trait::async_trait;
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Embedding oracle returning fixed-direction unit vectors.
    struct CannedEmbedder;

    #[async_trait]
    impl EmbeddingOracle for CannedEmbedder {
        async fn embed(&self, texts: &[String]) -> aerolex_common::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn pipeline_for(server: &MockServer) -> IngestionPipeline {
        let store = Arc::new(
            QdrantStore::new(StoreConfig {
                host: server.uri(),
                port: 6333,
                collection: "aviation_regulations".to_string(),
                api_key: None,
                hnsw_m: 16,
                hnsw_ef_construct: 100,
                hnsw_ef_search: 64,
                upsert_batch_size: 100,
                timeout_secs: 5,
            })
            .unwrap(),
        );
        IngestionPipeline::new(
            Arc::new(LexmlParser::new(TemporalExtractor::new(90))),
            Arc::new(PdfParser::new(TemporalExtractor::new(90), Box::new(DisabledOcr))),
            Chunker::new(512, 50),
            Arc::new(CannedEmbedder),
            Arc::new(VersionManager::new(store)),
            2,
        )
    }

    async fn mount_store_defaults(server: &MockServer) {
        Mock::given(method("POST"))
            .and(url_path("/collections/aviation_regulations/points/scroll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"points": [], "next_page_offset": null},
            })))
            .mount(server)
            .await;
        Mock::given(method("PUT"))
            .and(url_path("/collections/aviation_regulations/points"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .mount(server)
            .await;
    }

    const SAMPLE_XML: &str = r#"<LexML>
  <Metadado><Identificacao URN="urn:lex:br:federal:lei:2020-01-01;1234"/></Metadado>
  <Articulacao>
    <Artigo id="art5">
      <Rotulo>Art. 5º</Rotulo>
      <Caput><p>Esta lei entra em vigor em 01/01/2020.</p></Caput>
    </Artigo>
  </Articulacao>
</LexML>"#;

    #[tokio::test]
    async fn test_ingest_xml_source() {
        let server = MockServer::start().await;
        mount_store_defaults(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let xml_path = dir.path().join("lei1234.xml");
        std::fs::File::create(&xml_path)
            .unwrap()
            .write_all(SAMPLE_XML.as_bytes())
            .unwrap();

        let pipeline = pipeline_for(&server);
        let mut log = IngestionLog::load(dir.path());
        let summary = pipeline.ingest_paths(vec![xml_path.clone()], &mut log).await;

        assert_eq!(summary.processed.len(), 1);
        assert_eq!(summary.failed.len(), 0);
        assert_eq!(summary.chunks_ingested, 1);
        assert!(log.is_processed(&xml_path.display().to_string()));
    }

    #[tokio::test]
    async fn test_failed_source_does_not_abort_batch() {
        let server = MockServer::start().await;
        mount_store_defaults(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("lei1234.xml");
        std::fs::write(&good, SAMPLE_XML).unwrap();
        let missing = dir.path().join("nonexistent.xml");

        let pipeline = pipeline_for(&server);
        let mut log = IngestionLog::load(dir.path());
        let summary = pipeline
            .ingest_paths(vec![missing.clone(), good.clone()], &mut log)
            .await;

        assert_eq!(summary.processed.len(), 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, missing.display().to_string());
        assert!(!log.failed_files.is_empty());
    }

    #[tokio::test]
    async fn test_rerun_skips_processed_sources() {
        let server = MockServer::start().await;
        mount_store_defaults(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let xml_path = dir.path().join("lei1234.xml");
        std::fs::write(&xml_path, SAMPLE_XML).unwrap();

        let pipeline = pipeline_for(&server);
        let mut log = IngestionLog::load(dir.path());
        pipeline.ingest_paths(vec![xml_path.clone()], &mut log).await;
        let second = pipeline.ingest_paths(vec![xml_path], &mut log).await;

        assert_eq!(second.skipped, 1);
        assert_eq!(second.processed.len(), 0);
    }
}
