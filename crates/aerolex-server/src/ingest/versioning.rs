//! Regulation versioning and supersession
//!
//! When a new version of a `(doc_kind, doc_number)` group is ingested,
//! the active chunks of strictly older versions are retired:
//! `status → superseded`, `expiry_date → new version's effective
//! date`, `superseded_by → new version`. The new chunks record what
//! they replaced in `supersedes`.
//!
//! The retired old points and the new points travel in one batched
//! upsert, so a reader sees the pre- or post-supersession snapshot of
//! a version pair, not a mix. Concurrent supersession of the same
//! group serializes on a per-group async lock; the loser re-reads and
//! finds nothing left to retire.
//!
//! Versions sharing an effective date coexist; neither supersedes the
//! other. [`VersionManager::supersede_regulation`] is the operator
//! hook to force a resolution by hand.

use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use aerolex_common::types::ChunkStatus;
use aerolex_common::{AerolexError, Result};

use crate::store::{Condition, Filter, PointRecord, QdrantStore, RetrievedPoint};

/// What a supersession pass did.
#[derive(Debug, Default, Clone)]
pub struct SupersessionOutcome {
    /// Old-version points transitioned to superseded
    pub superseded_points: usize,

    /// Version string the new chunks now record in `supersedes`
    pub supersedes_version: Option<String>,
}

/// Applies the supersession protocol on ingestion.
pub struct VersionManager {
    store: Arc<QdrantStore>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VersionManager {
    pub fn new(store: Arc<QdrantStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Write a document version: retire strictly older active versions
    /// of the same `(doc_kind, doc_number)` group and insert the new
    /// points, all in one batched upsert.
    pub async fn ingest_document(
        &self,
        doc_kind: &str,
        doc_number: &str,
        new_version: &str,
        new_effective: Option<NaiveDate>,
        mut new_points: Vec<PointRecord>,
    ) -> Result<SupersessionOutcome> {
        let guard_key = format!("{doc_kind}:{doc_number}");
        let lock = self.lock_for(&guard_key).await;
        let _guard = lock.lock().await;

        let mut outcome = SupersessionOutcome::default();
        let mut retired: Vec<PointRecord> = Vec::new();

        if let Some(new_effective) = new_effective {
            // Re-read under the lock: a concurrent winner has already
            // retired these, leaving nothing to do here.
            let active = self
                .store
                .scroll_all(&group_filter(doc_kind, doc_number), true)
                .await?;

            for point in active {
                if !should_retire(&point.payload, new_version, new_effective) {
                    continue;
                }
                let old_version = payload_str(&point.payload, "version");
                match retired_record(&point, new_version, new_effective) {
                    Ok(record) => {
                        retired.push(record);
                        if outcome.supersedes_version.as_deref() < old_version.as_deref() {
                            outcome.supersedes_version = old_version;
                        }
                    },
                    Err(e) => warn!(error = %e, "Skipping unretirable point"),
                }
            }
        } else {
            debug!(
                doc_kind,
                doc_number, "New version has no effective date, supersession skipped"
            );
        }

        outcome.superseded_points = retired.len();

        if let Some(supersedes) = &outcome.supersedes_version {
            for point in &mut new_points {
                point.payload["supersedes"] = Value::String(supersedes.clone());
            }
        }

        let mut batch = retired;
        batch.extend(new_points);
        self.store.upsert(&batch).await?;

        if outcome.superseded_points > 0 {
            info!(
                doc_kind,
                doc_number,
                new_version,
                superseded = outcome.superseded_points,
                "Applied supersession"
            );
        }
        Ok(outcome)
    }

    /// Operator hook: retire one specific active version of a group in
    /// favor of `new_version`, without writing any new points.
    pub async fn supersede_regulation(
        &self,
        doc_kind: &str,
        doc_number: &str,
        old_version: &str,
        new_version: &str,
        new_effective: NaiveDate,
    ) -> Result<usize> {
        let guard_key = format!("{doc_kind}:{doc_number}");
        let lock = self.lock_for(&guard_key).await;
        let _guard = lock.lock().await;

        let mut filter = group_filter(doc_kind, doc_number);
        filter.must.push(Condition::matches("version", old_version));

        let points = self.store.scroll_all(&filter, true).await?;
        if points.is_empty() {
            warn!(doc_kind, doc_number, old_version, "Old version not found");
            return Ok(0);
        }

        let retired: Vec<PointRecord> = points
            .iter()
            .map(|p| retired_record(p, new_version, new_effective))
            .collect::<Result<_>>()?;
        self.store.upsert(&retired).await?;

        info!(
            doc_kind,
            doc_number,
            old_version,
            new_version,
            points = retired.len(),
            "Superseded regulation version"
        );
        Ok(retired.len())
    }

    async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn group_filter(doc_kind: &str, doc_number: &str) -> Filter {
    Filter::all(vec![
        Condition::matches("metadata.doc_kind", doc_kind),
        Condition::matches("metadata.doc_number", doc_number),
        Condition::matches("status", ChunkStatus::Active.as_str()),
    ])
}

/// An active point is retired when it belongs to a different version
/// that came into force strictly earlier. Equal effective dates
/// coexist; a missing old effective date is treated as older.
fn should_retire(payload: &Value, new_version: &str, new_effective: NaiveDate) -> bool {
    match payload_str(payload, "version") {
        Some(version) if version != new_version => {
            match payload_date(payload, "effective_date") {
                Some(old_effective) => old_effective < new_effective,
                None => true,
            }
        },
        _ => false,
    }
}

/// Rebuild a retrieved point as its superseded form, vector intact.
fn retired_record(
    point: &RetrievedPoint,
    new_version: &str,
    new_effective: NaiveDate,
) -> Result<PointRecord> {
    let id = point
        .id
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| {
            AerolexError::Store(format!("point id {} is not a UUID", point.id))
        })?;
    let vector = point
        .vector
        .clone()
        .ok_or_else(|| AerolexError::Store(format!("point {id} came without its vector")))?;

    Ok(PointRecord {
        id,
        vector,
        payload: retire_payload(point.payload.clone(), new_version, new_effective),
    })
}

/// The payload transition `active → superseded`.
fn retire_payload(mut payload: Value, new_version: &str, new_effective: NaiveDate) -> Value {
    payload["status"] = Value::String(ChunkStatus::Superseded.as_str().to_string());
    payload["expiry_date"] = Value::String(new_effective.format("%Y-%m-%d").to_string());
    payload["superseded_by"] = Value::String(new_version.to_string());
    payload
}

fn payload_str(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

fn payload_date(payload: &Value, key: &str) -> Option<NaiveDate> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}
