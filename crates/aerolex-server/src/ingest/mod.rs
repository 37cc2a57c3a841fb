//! Server-side ingestion: pipeline, versioning and the processing log

pub mod log;
pub mod pipeline;
pub mod versioning;

pub use log::IngestionLog;
pub use pipeline::{IngestionPipeline, IngestionSummary};
pub use versioning::{SupersessionOutcome, VersionManager};
