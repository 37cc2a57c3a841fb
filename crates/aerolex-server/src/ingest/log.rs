//! Ingestion processing log
//!
//! A small structured file next to the output directory recording
//! which sources were processed and which failed (with the error and a
//! timestamp). Re-runs consult it to skip completed sources. The
//! vector store stays the single source of durable corpus state; this
//! log only remembers work done.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use aerolex_common::Result;

/// Name of the log file inside the output directory.
pub const LOG_FILE_NAME: &str = "processing_log.json";

/// One failed source with its reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedSource {
    pub file: String,
    pub error: String,
    pub timestamp: String,
}

/// The persisted log.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct IngestionLog {
    pub processed_files: Vec<String>,
    pub failed_files: Vec<FailedSource>,
    pub last_run: Option<String>,

    #[serde(skip)]
    path: PathBuf,
}

impl IngestionLog {
    /// Load the log from `output_dir`, or start empty when none
    /// exists yet.
    pub fn load(output_dir: &Path) -> Self {
        let path = output_dir.join(LOG_FILE_NAME);
        let mut log = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Corrupt ingestion log, starting fresh");
                IngestionLog::default()
            }),
            Err(_) => IngestionLog::default(),
        };
        log.path = path;
        log
    }

    /// Persist the log, stamping `last_run`.
    pub fn save(&mut self) -> Result<()> {
        self.last_run = Some(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), "Saved ingestion log");
        Ok(())
    }

    pub fn is_processed(&self, source: &str) -> bool {
        self.processed_files.iter().any(|f| f == source)
    }

    pub fn mark_processed(&mut self, source: impl Into<String>) {
        let source = source.into();
        // A source that failed before and now succeeded is no longer a
        // failure.
        self.failed_files.retain(|f| f.file != source);
        if !self.is_processed(&source) {
            self.processed_files.push(source);
        }
    }

    pub fn mark_failed(&mut self, source: impl Into<String>, error: impl Into<String>) {
        let source = source.into();
        self.failed_files.retain(|f| f.file != source);
        self.failed_files.push(FailedSource {
            file: source,
            error: error.into(),
            timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = IngestionLog::load(dir.path());
        log.mark_processed("lei8666.xml");
        log.mark_failed("ica.pdf", "unreadable PDF");
        log.save().unwrap();

        let reloaded = IngestionLog::load(dir.path());
        assert!(reloaded.is_processed("lei8666.xml"));
        assert_eq!(reloaded.failed_files.len(), 1);
        assert_eq!(reloaded.failed_files[0].error, "unreadable PDF");
        assert!(reloaded.last_run.is_some());
    }

    #[test]
    fn test_success_clears_earlier_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = IngestionLog::load(dir.path());
        log.mark_failed("ica.pdf", "timeout");
        log.mark_processed("ica.pdf");
        assert!(log.is_processed("ica.pdf"));
        assert!(log.failed_files.is_empty());
    }

    #[test]
    fn test_mark_processed_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = IngestionLog::load(dir.path());
        log.mark_processed("a.xml");
        log.mark_processed("a.xml");
        assert_eq!(log.processed_files.len(), 1);
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = IngestionLog::load(dir.path());
        assert!(log.processed_files.is_empty());
        assert!(log.last_run.is_none());
    }
}
