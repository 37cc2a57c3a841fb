//! Deterministic point-id derivation for chunks
//!
//! The vector store accepts UUIDs as point ids. A chunk's id must be a
//! pure function of its origin so re-ingesting the same bytes is
//! idempotent: same document, same unit path, same chunk index, same id.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Field separator inside the hashed key. Unit separator keeps
/// `("a", "b/c")` and `("a/b", "c")` from colliding.
const KEY_SEP: u8 = 0x1f;

/// Derive the point id for a chunk from its identity tuple.
///
/// The id is the first 16 bytes of
/// `sha256(document_id ‖ 0x1f ‖ unit_path ‖ 0x1f ‖ chunk_index)`
/// interpreted as a UUID.
pub fn chunk_point_id(document_id: &str, unit_path: &str, chunk_index: usize) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update([KEY_SEP]);
    hasher.update(unit_path.as_bytes());
    hasher.update([KEY_SEP]);
    hasher.update(chunk_index.to_string().as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// Hex digest of a full source file, used by the ingestion log to
/// detect re-runs over identical bytes.
pub fn content_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}
