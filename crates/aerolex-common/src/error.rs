//! Error types for Aerolex

use thiserror::Error;

/// Result type alias for Aerolex operations
pub type Result<T> = std::result::Result<T, AerolexError>;

/// Main error type for Aerolex
///
/// Each variant corresponds to one of the error kinds a component can
/// surface: source I/O, structural parsing, oracle calls, store access.
/// Temporal resolution failures are warnings, not errors, and never use
/// this type.
#[derive(Error, Debug)]
pub enum AerolexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Source unreadable: {path}: {reason}")]
    SourceIo { path: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Embedding oracle error: {0}")]
    EmbeddingOracle(String),

    #[error("Embedding oracle timed out after {0}s")]
    EmbeddingTimeout(u64),

    #[error("LLM oracle error: {0}")]
    LlmOracle(String),

    #[error("LLM oracle timed out after {0}s")]
    LlmTimeout(u64),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl AerolexError {
    /// Stable machine-readable kind, used in structured error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AerolexError::Io(_) | AerolexError::SourceIo { .. } => "source_io_error",
            AerolexError::Serialization(_) => "serialization_error",
            AerolexError::Parse(_) => "parse_error",
            AerolexError::EmbeddingOracle(_) | AerolexError::EmbeddingTimeout(_) => {
                "embedding_oracle_error"
            },
            AerolexError::LlmOracle(_) | AerolexError::LlmTimeout(_) => "llm_oracle_error",
            AerolexError::Store(_) => "store_error",
            AerolexError::Config(_) => "config_error",
            AerolexError::Cancelled => "cancelled",
        }
    }

    /// True when the error came from an oracle deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            AerolexError::EmbeddingTimeout(_) | AerolexError::LlmTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(AerolexError::Parse("x".into()).kind(), "parse_error");
        assert_eq!(AerolexError::Store("x".into()).kind(), "store_error");
        assert_eq!(AerolexError::EmbeddingTimeout(10).kind(), "embedding_oracle_error");
        assert_eq!(AerolexError::LlmTimeout(60).kind(), "llm_oracle_error");
        assert_eq!(AerolexError::Cancelled.kind(), "cancelled");
    }

    #[test]
    fn test_timeout_flag() {
        assert!(AerolexError::EmbeddingTimeout(10).is_timeout());
        assert!(AerolexError::LlmTimeout(60).is_timeout());
        assert!(!AerolexError::Store("x".into()).is_timeout());
    }
}
