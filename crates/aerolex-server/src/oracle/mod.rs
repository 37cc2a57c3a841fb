//! External oracle clients
//!
//! The embedding model and the language model are abstract interfaces:
//! text→vector and text→text. The HTTP clients here are the bundled
//! implementations; anything honoring the traits can stand in (the
//! tests use canned oracles).

pub mod embedding;
pub mod llm;

pub use embedding::{EmbeddingOracle, HttpEmbeddingClient};
pub use llm::{LlmOracle, OllamaClient};
