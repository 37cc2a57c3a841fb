//! Configuration management
//!
//! All configuration is environment-derived, loaded once at startup
//! into an immutable [`Config`] that travels inside the application
//! context. Nothing reads the environment after load.

use serde::{Deserialize, Serialize};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default API host binding.
pub const DEFAULT_API_HOST: &str = "0.0.0.0";

/// Default API port.
pub const DEFAULT_API_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default per-client request budget per minute.
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 100;

/// Default CORS allowed origins.
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:8080";

// ============================================================================
// Vector Store Constants
// ============================================================================

/// Default vector store host.
pub const DEFAULT_QDRANT_HOST: &str = "localhost";

/// Default vector store HTTP port.
pub const DEFAULT_QDRANT_PORT: u16 = 6333;

/// Default collection name.
pub const DEFAULT_COLLECTION_NAME: &str = "aviation_regulations";

/// Default HNSW connections per node.
pub const DEFAULT_HNSW_M: u64 = 16;

/// Default HNSW construction beam width.
pub const DEFAULT_HNSW_EF_CONSTRUCT: u64 = 100;

/// Default HNSW search beam width.
pub const DEFAULT_HNSW_EF_SEARCH: u64 = 64;

/// Default sub-batch size for upserts.
pub const DEFAULT_UPSERT_BATCH_SIZE: usize = 100;

/// Default vector store / search timeout in seconds.
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Oracle Constants
// ============================================================================

/// Default embedding oracle endpoint.
pub const DEFAULT_EMBEDDING_ENDPOINT: &str = "http://localhost:11434";

/// Default embedding model name.
pub const DEFAULT_EMBEDDING_MODEL: &str = "rufimelo/Legal-BERTimbau-sts-large-ma-v3";

/// Default embedding batch size.
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 32;

/// Default embedding max sequence length.
pub const DEFAULT_EMBEDDING_MAX_LENGTH: usize = 512;

/// Default embedding dimension.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1024;

/// Default retry attempts for failed embedding batches.
pub const DEFAULT_EMBEDDING_MAX_RETRIES: u32 = 3;

/// Default LLM endpoint (Ollama).
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Default LLM model name.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";

/// Default LLM sampling temperature.
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.3;

/// Default LLM nucleus sampling parameter.
pub const DEFAULT_LLM_TOP_P: f32 = 0.9;

/// Default maximum tokens per LLM response.
pub const DEFAULT_LLM_MAX_TOKENS: u32 = 500;

/// Default LLM timeout in seconds.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Retrieval / Chunking Constants
// ============================================================================

/// Default number of results returned by a search.
pub const DEFAULT_SEARCH_TOP_K: usize = 5;

/// Default minimum similarity score.
pub const DEFAULT_SEARCH_SCORE_THRESHOLD: f32 = 0.7;

/// Default maximum tokens per chunk.
pub const DEFAULT_CHUNK_MAX_TOKENS: usize = 512;

/// Default overlap tokens between chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Default days added to the publication date when no vigor clause
/// resolves.
pub const DEFAULT_EFFECTIVE_DAYS: u32 = 90;

/// Default number of sources ingested concurrently.
pub const DEFAULT_INGESTION_PARALLELISM: usize = 4;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub chunking: ChunkingConfig,
    pub ingestion: IngestionConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    /// Per-client request budget per minute
    pub rate_limit_per_minute: u32,
}

/// API authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared key expected in the X-API-Key header
    pub api_key: String,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub collection: String,
    /// API key for a hosted store, when required
    pub api_key: Option<String>,
    pub hnsw_m: u64,
    pub hnsw_ef_construct: u64,
    pub hnsw_ef_search: u64,
    pub upsert_batch_size: usize,
    pub timeout_secs: u64,
}

impl StoreConfig {
    /// Base URL of the store's HTTP API.
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            self.host.clone()
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// Embedding oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub batch_size: usize,
    pub max_length: usize,
    pub dimension: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

/// LLM oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

/// Retrieval defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub top_k: usize,
    pub score_threshold: f32,
}

/// Chunker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap: usize,
    pub default_effective_days: u32,
}

/// Ingestion pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Sources parsed concurrently
    pub parallelism: usize,
    pub ocr_enabled: bool,
    pub ocr_language: String,
    /// Directory the ingestion log lives next to
    pub output_dir: String,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: env_string("API_HOST", DEFAULT_API_HOST),
                port: env_parse("API_PORT", DEFAULT_API_PORT),
                shutdown_timeout_secs: env_parse(
                    "API_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
                rate_limit_per_minute: env_parse("RATE_LIMIT", DEFAULT_RATE_LIMIT_PER_MINUTE),
            },
            auth: AuthConfig {
                api_key: std::env::var("API_KEY").unwrap_or_default(),
            },
            cors: CorsConfig {
                allowed_origins: env_string("CORS_ORIGINS", DEFAULT_CORS_ORIGINS)
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_parse("CORS_ALLOW_CREDENTIALS", true),
            },
            store: StoreConfig {
                host: env_string("QDRANT_HOST", DEFAULT_QDRANT_HOST),
                port: env_parse("QDRANT_PORT", DEFAULT_QDRANT_PORT),
                collection: env_string("QDRANT_COLLECTION_NAME", DEFAULT_COLLECTION_NAME),
                api_key: std::env::var("QDRANT_API_KEY").ok().filter(|s| !s.is_empty()),
                hnsw_m: env_parse("HNSW_M", DEFAULT_HNSW_M),
                hnsw_ef_construct: env_parse("HNSW_EF_CONSTRUCT", DEFAULT_HNSW_EF_CONSTRUCT),
                hnsw_ef_search: env_parse("HNSW_EF_SEARCH", DEFAULT_HNSW_EF_SEARCH),
                upsert_batch_size: env_parse("UPSERT_BATCH_SIZE", DEFAULT_UPSERT_BATCH_SIZE),
                timeout_secs: env_parse("SEARCH_TIMEOUT", DEFAULT_SEARCH_TIMEOUT_SECS),
            },
            embedding: EmbeddingConfig {
                endpoint: env_string("EMBEDDING_ENDPOINT", DEFAULT_EMBEDDING_ENDPOINT),
                model: env_string("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
                batch_size: env_parse("EMBEDDING_BATCH_SIZE", DEFAULT_EMBEDDING_BATCH_SIZE),
                max_length: env_parse("EMBEDDING_MAX_LENGTH", DEFAULT_EMBEDDING_MAX_LENGTH),
                dimension: env_parse("EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION),
                timeout_secs: env_parse("SEARCH_TIMEOUT", DEFAULT_SEARCH_TIMEOUT_SECS),
                max_retries: env_parse("EMBEDDING_MAX_RETRIES", DEFAULT_EMBEDDING_MAX_RETRIES),
            },
            llm: LlmConfig {
                endpoint: env_string("OLLAMA_HOST", DEFAULT_OLLAMA_HOST),
                model: env_string("OLLAMA_MODEL", DEFAULT_OLLAMA_MODEL),
                temperature: env_parse("LLM_TEMPERATURE", DEFAULT_LLM_TEMPERATURE),
                top_p: env_parse("LLM_TOP_P", DEFAULT_LLM_TOP_P),
                max_tokens: env_parse("LLM_MAX_TOKENS", DEFAULT_LLM_MAX_TOKENS),
                timeout_secs: env_parse("LLM_TIMEOUT", DEFAULT_LLM_TIMEOUT_SECS),
            },
            search: SearchConfig {
                top_k: env_parse("SEARCH_TOP_K", DEFAULT_SEARCH_TOP_K),
                score_threshold: env_parse(
                    "SEARCH_SCORE_THRESHOLD",
                    DEFAULT_SEARCH_SCORE_THRESHOLD,
                ),
            },
            chunking: ChunkingConfig {
                max_tokens: env_parse("CHUNK_MAX_TOKENS", DEFAULT_CHUNK_MAX_TOKENS),
                overlap: env_parse("CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP),
                default_effective_days: env_parse("DEFAULT_EFFECTIVE_DAYS", DEFAULT_EFFECTIVE_DAYS),
            },
            ingestion: IngestionConfig {
                parallelism: env_parse("INGESTION_PARALLELISM", DEFAULT_INGESTION_PARALLELISM),
                ocr_enabled: env_parse("ENABLE_OCR", false),
                ocr_language: env_string("OCR_LANGUAGE", "por"),
                output_dir: env_string("PROCESSED_DIR", "./data/processed"),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("API port must be greater than 0");
        }

        if self.auth.api_key.is_empty() {
            anyhow::bail!("API_KEY must be set");
        }

        if self.server.rate_limit_per_minute == 0 {
            anyhow::bail!("RATE_LIMIT must be greater than 0");
        }

        if self.store.collection.is_empty() {
            anyhow::bail!("Collection name cannot be empty");
        }

        if self.embedding.dimension == 0 {
            anyhow::bail!("Embedding dimension must be greater than 0");
        }

        if self.chunking.overlap >= self.chunking.max_tokens {
            anyhow::bail!(
                "Chunk overlap ({}) must be smaller than the token budget ({})",
                self.chunking.overlap,
                self.chunking.max_tokens
            );
        }

        if !(0.0..=1.0).contains(&self.search.score_threshold) {
            anyhow::bail!(
                "Score threshold must be within 0.0..=1.0, got {}",
                self.search.score_threshold
            );
        }

        if self.search.top_k == 0 || self.search.top_k > 50 {
            anyhow::bail!("SEARCH_TOP_K must be within 1..=50, got {}", self.search.top_k);
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_API_HOST.to_string(),
                port: DEFAULT_API_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            },
            auth: AuthConfig {
                api_key: String::new(),
            },
            cors: CorsConfig {
                allowed_origins: DEFAULT_CORS_ORIGINS
                    .split(',')
                    .map(|s| s.to_string())
                    .collect(),
                allow_credentials: true,
            },
            store: StoreConfig {
                host: DEFAULT_QDRANT_HOST.to_string(),
                port: DEFAULT_QDRANT_PORT,
                collection: DEFAULT_COLLECTION_NAME.to_string(),
                api_key: None,
                hnsw_m: DEFAULT_HNSW_M,
                hnsw_ef_construct: DEFAULT_HNSW_EF_CONSTRUCT,
                hnsw_ef_search: DEFAULT_HNSW_EF_SEARCH,
                upsert_batch_size: DEFAULT_UPSERT_BATCH_SIZE,
                timeout_secs: DEFAULT_SEARCH_TIMEOUT_SECS,
            },
            embedding: EmbeddingConfig {
                endpoint: DEFAULT_EMBEDDING_ENDPOINT.to_string(),
                model: DEFAULT_EMBEDDING_MODEL.to_string(),
                batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
                max_length: DEFAULT_EMBEDDING_MAX_LENGTH,
                dimension: DEFAULT_EMBEDDING_DIMENSION,
                timeout_secs: DEFAULT_SEARCH_TIMEOUT_SECS,
                max_retries: DEFAULT_EMBEDDING_MAX_RETRIES,
            },
            llm: LlmConfig {
                endpoint: DEFAULT_OLLAMA_HOST.to_string(),
                model: DEFAULT_OLLAMA_MODEL.to_string(),
                temperature: DEFAULT_LLM_TEMPERATURE,
                top_p: DEFAULT_LLM_TOP_P,
                max_tokens: DEFAULT_LLM_MAX_TOKENS,
                timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            },
            search: SearchConfig {
                top_k: DEFAULT_SEARCH_TOP_K,
                score_threshold: DEFAULT_SEARCH_SCORE_THRESHOLD,
            },
            chunking: ChunkingConfig {
                max_tokens: DEFAULT_CHUNK_MAX_TOKENS,
                overlap: DEFAULT_CHUNK_OVERLAP,
                default_effective_days: DEFAULT_EFFECTIVE_DAYS,
            },
            ingestion: IngestionConfig {
                parallelism: DEFAULT_INGESTION_PARALLELISM,
                ocr_enabled: false,
                ocr_language: "por".to_string(),
                output_dir: "./data/processed".to_string(),
            },
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            auth: AuthConfig {
                api_key: "secret".to_string(),
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config_validates_with_key() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_api_key_rejected() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_overlap_must_be_below_budget() {
        let mut config = valid_config();
        config.chunking.overlap = config.chunking.max_tokens;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = valid_config();
        config.search.score_threshold = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_top_k_bounds() {
        let mut config = valid_config();
        config.search.top_k = 51;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let mut config = valid_config();
        config.server.rate_limit_per_minute = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_base_url() {
        let mut store = valid_config().store;
        assert_eq!(store.base_url(), "http://localhost:6333");

        store.host = "https://cloud.example".to_string();
        assert_eq!(store.base_url(), "https://cloud.example");
    }
}
