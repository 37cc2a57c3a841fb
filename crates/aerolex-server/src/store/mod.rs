//! Vector store adapter

pub mod filter;
pub mod qdrant;

pub use filter::{Condition, Filter};
pub use qdrant::{CollectionInfo, PointRecord, QdrantStore, RetrievedPoint, ScoredPoint};
