//! Payload filter grammar for the vector store
//!
//! Typed construction of the store's filter JSON (must/should groups,
//! match and datetime-range conditions, null checks). The temporal
//! filter composed here is the heart of point-in-time retrieval:
//!
//! ```text
//! (   (status = active    AND effective_date <= D
//!                         AND (expiry_date IS NULL OR expiry_date >= D))
//!  OR (status = superseded AND effective_date <= D AND expiry_date > D)
//! ) AND (user filter)
//! ```
//!
//! The superseded branch is what keeps historical versions queryable:
//! a retired chunk stays visible for dates strictly before its
//! supersession date, and exactly on that date only the successor
//! answers. An active chunk whose expiry came from a revocation clause
//! is still included on the expiry date itself.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use aerolex_common::types::ChunkStatus;

/// Payload fields addressable without a `metadata.` prefix.
const TOP_LEVEL_FIELDS: [&str; 6] = [
    "status",
    "regulation_id",
    "version",
    "effective_date",
    "expiry_date",
    "chunk_index",
];

/// A boolean filter over payload fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Condition>,
}

/// One condition of a filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Condition {
    Match {
        key: String,
        #[serde(rename = "match")]
        matches: MatchValue,
    },
    Range {
        key: String,
        range: DateRange,
    },
    IsNull {
        is_null: FieldRef,
    },
    Nested(Filter),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchValue {
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DateRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldRef {
    pub key: String,
}

impl Condition {
    /// Equality on a payload field.
    pub fn matches(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Match {
            key: key.into(),
            matches: MatchValue {
                value: value.into(),
            },
        }
    }

    /// `field <= date`
    pub fn date_lte(key: impl Into<String>, date: NaiveDate) -> Self {
        Condition::Range {
            key: key.into(),
            range: DateRange {
                lte: Some(iso(date)),
                ..DateRange::default()
            },
        }
    }

    /// `field >= date`
    pub fn date_gte(key: impl Into<String>, date: NaiveDate) -> Self {
        Condition::Range {
            key: key.into(),
            range: DateRange {
                gte: Some(iso(date)),
                ..DateRange::default()
            },
        }
    }

    /// `field > date`
    pub fn date_gt(key: impl Into<String>, date: NaiveDate) -> Self {
        Condition::Range {
            key: key.into(),
            range: DateRange {
                gt: Some(iso(date)),
                ..DateRange::default()
            },
        }
    }

    /// `field IS NULL` (absent or null payload value)
    pub fn is_null(key: impl Into<String>) -> Self {
        Condition::IsNull {
            is_null: FieldRef { key: key.into() },
        }
    }
}

impl Filter {
    /// A filter requiring all the given conditions.
    pub fn all(conditions: Vec<Condition>) -> Self {
        Filter {
            must: conditions,
            should: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty()
    }

    /// The composite point-in-time filter. Temporal constraints are
    /// strict; anything violating them is excluded, not down-weighted.
    ///
    /// Two branches keep historical versions reachable: active chunks
    /// in force on `date` (expiry open-ended or not yet passed,
    /// inclusive), and superseded chunks whose retirement lies strictly
    /// after `date`.
    pub fn temporal(date: NaiveDate, extra: Option<Filter>) -> Self {
        let active = Condition::Nested(Filter::all(vec![
            Condition::matches("status", ChunkStatus::Active.as_str()),
            Condition::date_lte("effective_date", date),
            Condition::Nested(Filter {
                must: Vec::new(),
                should: vec![
                    Condition::date_gte("expiry_date", date),
                    Condition::is_null("expiry_date"),
                ],
            }),
        ]));
        let superseded = Condition::Nested(Filter::all(vec![
            Condition::matches("status", ChunkStatus::Superseded.as_str()),
            Condition::date_lte("effective_date", date),
            Condition::date_gt("expiry_date", date),
        ]));

        let mut filter = Filter {
            must: Vec::new(),
            should: vec![active, superseded],
        };
        // User conditions AND with the temporal branches; a user filter
        // carrying its own should-group nests so the groups stay apart.
        match extra {
            Some(extra) if extra.should.is_empty() => filter.must.extend(extra.must),
            Some(extra) if !extra.is_empty() => filter.must.push(Condition::Nested(extra)),
            _ => {},
        }
        filter
    }

    /// Build a filter from the request's free-form `filters` object:
    /// every entry becomes an equality condition. Unknown keys address
    /// the open metadata bag.
    pub fn from_user_filters(filters: &serde_json::Map<String, Value>) -> Self {
        let conditions = filters
            .iter()
            .map(|(key, value)| {
                let key = if TOP_LEVEL_FIELDS.contains(&key.as_str()) || key.starts_with("metadata.")
                {
                    key.clone()
                } else {
                    format!("metadata.{key}")
                };
                Condition::matches(key, value.clone())
            })
            .collect();
        Filter::all(conditions)
    }
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
