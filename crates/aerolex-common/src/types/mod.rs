//! Regulatory domain types
//!
//! The atomic unit stored and searched is a [`Chunk`], derived from a
//! [`RegulatoryUnit`] of a source document. Units come in two shapes:
//! legal articles (from LexML XML) and dotted numbered sections (from
//! ICA PDFs); both are normalized into the same struct, the shape only
//! survives in the label and context strings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::ids::chunk_point_id;

/// Document kind of a regulatory source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    Lei,
    Decreto,
    Resolucao,
    Portaria,
    Ica,
    #[default]
    Other,
}

impl DocKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocKind::Lei => "lei",
            DocKind::Decreto => "decreto",
            DocKind::Resolucao => "resolucao",
            DocKind::Portaria => "portaria",
            DocKind::Ica => "ica",
            DocKind::Other => "other",
        }
    }

    /// Parse a kind from URN segments or free text. Accepts accented
    /// and unaccented spellings; anything unknown maps to `Other`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "lei" => DocKind::Lei,
            "decreto" => DocKind::Decreto,
            "resolucao" | "resolução" => DocKind::Resolucao,
            "portaria" => DocKind::Portaria,
            "ica" => DocKind::Ica,
            _ => DocKind::Other,
        }
    }
}

impl std::fmt::Display for DocKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Document-level metadata extracted by a structural parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DocumentMeta {
    /// Canonical `urn:lex:...` identifier, when the source carries one
    pub urn: Option<String>,

    /// Publishing authority (e.g., "federal", "DECEA")
    pub authority: Option<String>,

    /// Document kind
    pub kind: DocKind,

    /// Document number (e.g., "8666", "ICA 100-12")
    pub number: String,

    /// Date the document was published
    pub publication_date: Option<NaiveDate>,

    /// Document title, when known
    pub title: Option<String>,

    /// Source URI or file path the document was read from
    pub source: String,

    /// Operator-assigned category (from the filename contract)
    pub category: Option<String>,
}

/// Reference to a document amended by another one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amendment {
    pub kind: DocKind,
    pub number: String,
}

impl Amendment {
    /// Slug form used in payload metadata, e.g. `lei-1234`.
    pub fn slug(&self) -> String {
        format!("{}-{}", self.kind, self.number)
    }
}

/// Temporal attributes derived from a unit's text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TemporalInfo {
    /// First date the unit is legally in force
    pub effective_date: Option<NaiveDate>,

    /// First date the unit is no longer in force
    pub expiry_date: Option<NaiveDate>,

    /// Whether the text carries a revocation marker
    pub is_revoked: bool,

    /// Document this unit amends, when stated
    pub amends: Option<Amendment>,
}

/// A node of a document's hierarchy carried forward for chunking
///
/// `context` holds the ordered ancestor labels, outermost first; the
/// unit's own label is not part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryUnit {
    /// Identifier unique within the corpus (e.g., "8666-art3")
    pub regulation_id: String,

    /// Human-readable unit label ("Art. 3º", "2.1.4")
    pub label: String,

    /// Unit title, empty for label-only leaves
    pub title: String,

    /// Ancestor labels, outermost first
    pub context: Vec<String>,

    /// Canonical unit text, already prefixed with the label
    pub text: String,

    /// Temporal attributes of the unit
    pub temporal: TemporalInfo,

    /// Metadata of the enclosing document
    pub document: DocumentMeta,
}

impl RegulatoryUnit {
    /// Stable path of the unit inside its document, used for chunk
    /// identity. Contexts are joined before the label so two leaves
    /// with the same label under different ancestors stay distinct.
    pub fn unit_path(&self) -> String {
        let mut parts = self.context.clone();
        parts.push(self.label.clone());
        parts.join("/")
    }

    /// The identity of the enclosing document: the URN when present,
    /// otherwise kind and number.
    pub fn document_id(&self) -> String {
        match &self.document.urn {
            Some(urn) => urn.clone(),
            None => format!("{}-{}", self.document.kind, self.document.number),
        }
    }
}

/// Lifecycle status of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    #[default]
    Active,
    Superseded,
}

impl ChunkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::Active => "active",
            ChunkStatus::Superseded => "superseded",
        }
    }
}

impl std::fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bounded-size slice of a regulatory unit; what gets embedded,
/// stored and retrieved.
///
/// Chunks are never mutated after ingestion except by the version
/// manager transitioning `active → superseded` and setting
/// `expiry_date` / `superseded_by`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic point id (hash of document id, unit path, index)
    pub id: Uuid,

    /// Unit regulation id suffixed `-chunk-{index}`
    pub regulation_id: String,

    /// Authoritative chunk text, readable standalone (starts with the
    /// unit label)
    pub text: String,

    /// Full chain of structural ancestors, outermost first
    pub context: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,

    pub status: ChunkStatus,

    /// Version tag; the publication date when nothing better is known
    pub version: String,

    /// Version string of the sibling this chunk replaced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,

    /// Version string of the sibling that replaced this chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,

    /// Zero-based index within the unit
    pub chunk_index: usize,

    /// Whitespace-token estimate of `text`
    pub token_estimate: usize,

    /// Open metadata bag (doc kind, category, original URN, ...)
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Chunk {
    /// Build the chunk for one slice of a unit. The id is derived from
    /// the identity tuple, everything temporal is inherited from the
    /// unit.
    pub fn from_unit(unit: &RegulatoryUnit, text: String, chunk_index: usize) -> Self {
        let token_estimate = token_estimate(&text);
        let status = if unit.temporal.is_revoked {
            ChunkStatus::Superseded
        } else {
            ChunkStatus::Active
        };
        let version = unit
            .document
            .publication_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unversioned".to_string());

        let mut metadata = BTreeMap::new();
        metadata.insert("doc_kind".into(), unit.document.kind.as_str().into());
        metadata.insert("doc_number".into(), unit.document.number.clone().into());
        if let Some(urn) = &unit.document.urn {
            metadata.insert("urn".into(), urn.clone().into());
        }
        if let Some(category) = &unit.document.category {
            metadata.insert("category".into(), category.clone().into());
        }
        if let Some(title) = &unit.document.title {
            metadata.insert("doc_title".into(), title.clone().into());
        }
        if let Some(pub_date) = unit.document.publication_date {
            metadata.insert(
                "publication_date".into(),
                pub_date.format("%Y-%m-%d").to_string().into(),
            );
        }
        if let Some(amends) = &unit.temporal.amends {
            metadata.insert("amends".into(), amends.slug().into());
        }
        metadata.insert("source".into(), unit.document.source.clone().into());

        // Context on the chunk ends with the unit's own label, so even
        // a top-level unit carries a non-empty descending chain.
        let mut context = unit.context.clone();
        if !unit.label.is_empty() {
            context.push(unit.label.clone());
        }

        Chunk {
            id: chunk_point_id(&unit.document_id(), &unit.unit_path(), chunk_index),
            regulation_id: format!("{}-chunk-{}", unit.regulation_id, chunk_index),
            text,
            context,
            effective_date: unit.temporal.effective_date,
            expiry_date: unit.temporal.expiry_date,
            status,
            version,
            supersedes: None,
            superseded_by: None,
            chunk_index,
            token_estimate,
            metadata,
        }
    }

    /// `effective_date ≤ expiry_date` whenever both are present.
    pub fn dates_ordered(&self) -> bool {
        match (self.effective_date, self.expiry_date) {
            (Some(eff), Some(exp)) => eff <= exp,
            _ => true,
        }
    }

    /// Display form of the chunk text: horizontal whitespace collapsed.
    /// The stored `text` keeps the original bytes; compression happens
    /// only here.
    pub fn display_text(&self) -> String {
        compress_horizontal_ws(&self.text)
    }
}

/// Whitespace-delimited word count; a robust lower bound on the
/// embedder's token count.
pub fn token_estimate(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Collapse runs of spaces and tabs into a single space, per line.
/// Newlines survive.
pub fn compress_horizontal_ws(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let mut last_was_space = false;
        for ch in line.trim_end().chars() {
            if ch == ' ' || ch == '\t' {
                if !last_was_space {
                    out.push(' ');
                }
                last_was_space = true;
            } else {
                out.push(ch);
                last_was_space = false;
            }
        }
    }
    out
}
