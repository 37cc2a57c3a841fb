//! Aerolex Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the Aerolex project.
//!
//! # Overview
//!
//! This crate provides common functionality used across all Aerolex
//! workspace members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Identity**: Deterministic chunk point-id derivation
//! - **Types**: Regulatory domain types (documents, units, chunks)
//! - **Logging**: Centralized tracing initialization
//!
//! # Example
//!
//! ```no_run
//! use aerolex_common::{Result, AerolexError};
//! use aerolex_common::ids::chunk_point_id;
//!
//! fn point_for(doc: &str, path: &str) -> Result<uuid::Uuid> {
//!     Ok(chunk_point_id(doc, path, 0))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{AerolexError, Result};
