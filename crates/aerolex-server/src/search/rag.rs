//! Retrieval-augmented answering
//!
//! Embed the question, retrieve the passages in force on the target
//! date, compose a grounded prompt and call the LLM oracle. When
//! nothing clears the score threshold the canned abstention answer is
//! returned without spending an LLM call; when the oracle fails, the
//! same canned answer goes out with the retrieved sources attached.

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use aerolex_common::Result;

use super::{SearchHit, VectorSearch};
use crate::oracle::LlmOracle;
use crate::store::Filter;

/// Canned answer when retrieval comes back empty or generation fails.
pub const NO_INFORMATION_ANSWER: &str =
    "Não encontrei informações relevantes nos documentos disponíveis.";

/// Role instruction anchoring the assistant.
const SYSTEM_PROMPT: &str = "Você é um assistente especializado em regulamentação de aviação \
civil brasileira. Responda sempre em português, de forma clara e precisa, citando as fontes. \
Seja factual e baseie suas respostas apenas nas informações fornecidas.";

/// Answer with its sources and timing breakdown.
#[derive(Debug, Clone)]
pub struct RagOutcome {
    pub answer: String,
    pub sources: Vec<SearchHit>,
    pub search_time_ms: u64,
    pub llm_time_ms: u64,
    pub total_time_ms: u64,
}

/// Complete RAG pipeline: retrieve then generate.
pub struct RagPipeline {
    search: VectorSearch,
    llm: Arc<dyn LlmOracle>,
}

impl RagPipeline {
    pub fn new(search: VectorSearch, llm: Arc<dyn LlmOracle>) -> Self {
        Self { search, llm }
    }

    /// Answer `question` grounded in the passages valid on `date`
    /// (or the whole active corpus when no date is given).
    pub async fn query(
        &self,
        question: &str,
        date: Option<NaiveDate>,
        limit: Option<usize>,
        score_threshold: Option<f32>,
        filter: Option<Filter>,
    ) -> Result<RagOutcome> {
        let start = Instant::now();

        let sources = match date {
            Some(date) => {
                self.search
                    .search_temporal(question, date, limit, score_threshold, filter)
                    .await?
            },
            None => {
                self.search
                    .search(question, limit, score_threshold, filter)
                    .await?
            },
        };
        let search_time_ms = elapsed_ms(start);

        if sources.is_empty() {
            info!("No sources above threshold, abstaining without LLM call");
            return Ok(RagOutcome {
                answer: NO_INFORMATION_ANSWER.to_string(),
                sources,
                search_time_ms,
                llm_time_ms: 0,
                total_time_ms: elapsed_ms(start),
            });
        }

        let prompt = build_prompt(question, &sources);

        let llm_start = Instant::now();
        let answer = match self.llm.generate(SYSTEM_PROMPT, &prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                // Generation failure degrades to the canned answer; the
                // retrieved sources still go out.
                warn!(error = %e, "LLM oracle failed, returning fallback answer");
                NO_INFORMATION_ANSWER.to_string()
            },
        };
        let llm_time_ms = elapsed_ms(llm_start);

        let outcome = RagOutcome {
            answer,
            sources,
            search_time_ms,
            llm_time_ms,
            total_time_ms: elapsed_ms(start),
        };
        info!(
            total_ms = outcome.total_time_ms,
            sources = outcome.sources.len(),
            "RAG query completed"
        );
        Ok(outcome)
    }
}

/// Numbered context blocks, each labeled with regulation id and
/// version, then the question and the grounding instruction.
fn build_prompt(question: &str, sources: &[SearchHit]) -> String {
    let mut context = String::new();
    for (i, source) in sources.iter().enumerate() {
        let mut header = format!("[{}] [{}", i + 1, source.regulation_id);
        if let Some(version) = &source.version {
            header.push_str(&format!(" - Versão {version}"));
        }
        header.push(']');
        context.push_str(&header);
        context.push('\n');
        context.push_str(&source.text);
        context.push_str("\n\n");
    }

    format!(
        "Sua tarefa é responder perguntas com base APENAS nas normas regulatórias fornecidas \
abaixo.\nSempre cite a fonte (número da norma e artigo ou seção) ao mencionar informações.\n\
Se a informação necessária não estiver nas normas fornecidas, diga claramente que não \
encontrou a informação nos documentos disponíveis.\n\n\
=== NORMAS REGULATÓRIAS ===\n{context}\
=== PERGUNTA DO USUÁRIO ===\n{question}\n\n\
=== RESPOSTA ===\nBaseado nas normas fornecidas:"
    )
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{SearchConfig, StoreConfig};
    use crate::oracle::EmbeddingOracle;
    use crate::store::QdrantStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

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

    /// LLM stub recording how often it was called.
    struct CountingLlm {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LlmOracle for CountingLlm {
        async fn generate(&self, _system: &str, prompt: &str) -> aerolex_common::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(aerolex_common::AerolexError::LlmTimeout(60))
            } else {
                assert!(prompt.contains("=== NORMAS REGULATÓRIAS ==="));
                Ok("Baseado nas normas, a resposta é sim.".to_string())
            }
        }
    }

    async fn pipeline_with(
        server: &MockServer,
        llm: Arc<CountingLlm>,
    ) -> RagPipeline {
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
        let search = VectorSearch::new(
            store,
            Arc::new(CannedEmbedder),
            SearchConfig {
                top_k: 5,
                score_threshold: 0.7,
            },
        );
        RagPipeline::new(search, llm)
    }

    async fn mount_search(server: &MockServer, hits: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/collections/aviation_regulations/points/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": hits})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_abstention_skips_llm() {
        let server = MockServer::start().await;
        mount_search(&server, json!([])).await;

        let llm = Arc::new(CountingLlm {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let pipeline = pipeline_with(&server, llm.clone()).await;

        let outcome = pipeline
            .query("qual é o melhor restaurante de Brasília", None, None, None, None)
            .await
            .unwrap();

        assert_eq!(outcome.answer, NO_INFORMATION_ANSWER);
        assert!(outcome.sources.is_empty());
        assert_eq!(outcome.llm_time_ms, 0);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_grounded_answer_with_sources() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            json!([{
                "id": "0a2e9b2e-5df1-4f34-9a5c-000000000001",
                "score": 0.9,
                "payload": {
                    "regulation_id": "8666-art3-chunk-0",
                    "text": "Art. 3º A licitação destina-se a garantir.",
                    "version": "1993-06-21",
                },
            }]),
        )
        .await;

        let llm = Arc::new(CountingLlm {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let pipeline = pipeline_with(&server, llm.clone()).await;

        let outcome = pipeline
            .query("o que garante a licitação?", None, None, None, None)
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Baseado nas normas, a resposta é sim.");
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_with_sources() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            json!([{
                "id": "0a2e9b2e-5df1-4f34-9a5c-000000000001",
                "score": 0.9,
                "payload": {"regulation_id": "8666-art3-chunk-0", "text": "Art. 3º ..."},
            }]),
        )
        .await;

        let llm = Arc::new(CountingLlm {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let pipeline = pipeline_with(&server, llm.clone()).await;

        let outcome = pipeline.query("pergunta", None, None, None, None).await.unwrap();
        assert_eq!(outcome.answer, NO_INFORMATION_ANSWER);
        assert_eq!(outcome.sources.len(), 1);
    }

    #[test]
    fn test_prompt_numbers_and_labels_sources() {
        let sources = vec![
            SearchHit {
                regulation_id: "8666-art3-chunk-0".to_string(),
                text: "Art. 3º ...".to_string(),
                score: 0.9,
                version: Some("1993-06-21".to_string()),
                effective_date: None,
                expiry_date: None,
                metadata: serde_json::Value::Null,
            },
            SearchHit {
                regulation_id: "ICA 100-12-sec-2.1-chunk-0".to_string(),
                text: "2.1 FINALIDADE ...".to_string(),
                score: 0.8,
                version: None,
                effective_date: None,
                expiry_date: None,
                metadata: serde_json::Value::Null,
            },
        ];

        let prompt = build_prompt("pergunta?", &sources);
        assert!(prompt.contains("[1] [8666-art3-chunk-0 - Versão 1993-06-21]"));
        assert!(prompt.contains("[2] [ICA 100-12-sec-2.1-chunk-0]"));
        assert!(prompt.contains("=== PERGUNTA DO USUÁRIO ===\npergunta?"));
        assert!(prompt.contains("cite a fonte"));
    }
}
