//! Aerolex Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Structural parsers and chunking for the Aerolex corpus:
//!
//! - **LexML parser**: legal XML into per-article units
//! - **PDF parser**: ICA PDFs into dotted numbered-section units
//! - **Temporal extractor**: effective/expiry dates and revocation
//!   status from free text
//! - **Chunker**: token-budgeted splitting along legal-unit seams
//!
//! All parsers are pure functions of their input bytes; they hold no
//! shared mutable state and may run concurrently.

pub mod chunking;
pub mod lexml;
pub mod pdf;
pub mod temporal;

pub use chunking::Chunker;
pub use lexml::LexmlParser;
pub use pdf::PdfParser;
pub use temporal::TemporalExtractor;
