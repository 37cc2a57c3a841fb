//! Temporal extraction from regulatory text
//!
//! Derives effective date, expiry date and revocation status from the
//! date-sensitive phrasing Brazilian legal texts use ("entra em vigor
//! em 15/06/2023", "fica revogado", "na data de sua publicação"...).
//!
//! Every pattern attempt returns a present/absent outcome; the resolver
//! picks the first hit in priority order:
//!
//! 1. explicit date next to a vigor clause
//! 2. publication-referent clause (effective date = publication date)
//! 3. publication date plus a configured default offset
//!
//! Unparseable date literals never fail the extraction; the field stays
//! unset and the literal is logged.

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use tracing::{debug, warn};

use aerolex_common::types::{Amendment, DocKind, TemporalInfo};

/// How far after a revocation cue a date literal is still attributed
/// to it, in bytes.
const REVOCATION_DATE_WINDOW: usize = 100;

/// Extractor holding the compiled pattern tables.
///
/// Construction compiles every pattern once; the extractor is cheap to
/// share and holds no mutable state.
pub struct TemporalExtractor {
    default_effective_days: i64,
    effective_dated: Vec<Regex>,
    publication_referent: Regex,
    revocation: Vec<Regex>,
    amendment: Vec<Regex>,
    date_literal: Regex,
}

impl TemporalExtractor {
    /// Build an extractor. `default_effective_days` is the fallback
    /// offset applied to the publication date when no vigor clause
    /// resolves.
    pub fn new(default_effective_days: u32) -> Self {
        let effective_dated = [
            // "entra em vigor em 15/06/2023", "entrará em vigor a partir de ..."
            r"(?i)entra(?:rá)?\s+em\s+vigor\s+(?:em|na\s+data\s+de|a\s+partir\s+de)?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})",
            // "vigência a partir de 01/01/2024"
            r"(?i)vig[êe]ncia\s+a\s+partir\s+de\s+(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})",
            // "produzirá efeitos a partir de 01-01-2024"
            r"(?i)produzir[áa]\s+efeitos?\s+(?:a\s+partir\s+de\s+)?(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})",
            // "passa a vigorar em 01/01/2024"
            r"(?i)passa\s+a\s+vigorar\s+(?:em|na\s+data\s+de)?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})",
        ];
        let revocation = [
            // "revoga a Lei nº 1234", "revoga-se o Decreto 99"
            r"(?i)revoga(?:m|da|do)?(?:-se)?\s+(?:a|o)\s+(lei|decreto|resolu[çc][ãa]o|portaria)\s+n?[ºo°]?\s*(\d+)",
            // "fica revogado", "são revogadas"
            r"(?i)(?:fica(?:m)?|s[ãa]o|est[áa])\s+revogad[oa]s?",
            // "perde sua vigência"
            r"(?i)perde(?:rá)?\s+(?:sua\s+)?vig[êe]ncia",
            // "deixa de vigorar"
            r"(?i)deixa(?:r[áa])?\s+de\s+vigorar",
        ];
        let amendment = [
            r"(?i)altera\s+(?:a|o)\s+(lei|decreto|resolu[çc][ãa]o|portaria)\s+n?[ºo°]?\s*(\d+)",
            r"(?i)modifica\s+(?:a|o)\s+(lei|decreto|resolu[çc][ãa]o|portaria)\s+n?[ºo°]?\s*(\d+)",
            r"(?i)d[áa]\s+nova\s+reda[çc][ãa]o\s+(?:[àa]|ao)\s+(lei|decreto|resolu[çc][ãa]o|portaria)\s+n?[ºo°]?\s*(\d+)",
        ];

        Self {
            default_effective_days: i64::from(default_effective_days),
            effective_dated: compile_all(&effective_dated),
            publication_referent: compile(
                r"(?i)(?:na\s+data\s+de\s+(?:sua\s+)?publica[çc][ãa]o|(?:ap[óo]s|da)\s+(?:sua\s+)?publica[çc][ãa]o)",
            ),
            revocation: compile_all(&revocation),
            amendment: compile_all(&amendment),
            date_literal: compile(r"(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})"),
        }
    }

    /// Extract temporal attributes from `text`.
    ///
    /// `publication_date` is the known publication date of the
    /// enclosing document, used for publication-referent clauses and
    /// the fallback.
    pub fn extract(&self, text: &str, publication_date: Option<NaiveDate>) -> TemporalInfo {
        let mut info = TemporalInfo {
            effective_date: self.effective_date(text, publication_date),
            ..TemporalInfo::default()
        };

        info.is_revoked = self.revocation.iter().any(|p| p.is_match(text));
        if info.is_revoked {
            info.expiry_date = self.revocation_date(text);
        }

        if info.effective_date.is_none() {
            if let Some(published) = publication_date {
                info.effective_date =
                    published.checked_add_signed(chrono::Duration::days(self.default_effective_days));
                debug!(
                    days = self.default_effective_days,
                    "No explicit effective date, using publication date plus default offset"
                );
            }
        }

        info.amends = self.amendment(text);

        // Extracted dates can come out inverted on garbled text; the
        // ingested invariant is effective <= expiry.
        if let (Some(eff), Some(exp)) = (info.effective_date, info.expiry_date) {
            if eff > exp {
                warn!(%eff, %exp, "Dropping expiry date earlier than effective date");
                info.expiry_date = None;
            }
        }

        info
    }

    fn effective_date(&self, text: &str, publication_date: Option<NaiveDate>) -> Option<NaiveDate> {
        for pattern in &self.effective_dated {
            if let Some(caps) = pattern.captures(text) {
                if let Some(literal) = caps.get(1) {
                    if let Some(date) = self.parse_date_literal(literal.as_str()) {
                        debug!(%date, "Found explicit effective date");
                        return Some(date);
                    }
                }
            }
        }

        if self.publication_referent.is_match(text) {
            if let Some(published) = publication_date {
                debug!(%published, "Effective date taken from publication clause");
                return Some(published);
            }
        }

        None
    }

    /// Look for a date literal in a bounded window after the first
    /// matching revocation cue.
    fn revocation_date(&self, text: &str) -> Option<NaiveDate> {
        for pattern in &self.revocation {
            if let Some(found) = pattern.find(text) {
                let window_end = floor_char_boundary(text, found.end() + REVOCATION_DATE_WINDOW);
                let window = &text[found.end()..window_end];
                if let Some(caps) = self.date_literal.captures(window) {
                    if let Some(date) = self.parse_date_literal(&caps[0]) {
                        debug!(%date, "Found revocation date");
                        return Some(date);
                    }
                }
            }
        }
        None
    }

    fn amendment(&self, text: &str) -> Option<Amendment> {
        for pattern in &self.amendment {
            if let Some(caps) = pattern.captures(text) {
                let amendment = Amendment {
                    kind: DocKind::parse(&caps[1]),
                    number: caps[2].to_string(),
                };
                debug!(amends = %amendment.slug(), "Found amendment marker");
                return Some(amendment);
            }
        }
        None
    }

    /// Parse a `DD/MM/YYYY` or `DD-MM-YYYY` literal, day-first, with
    /// 2- or 4-digit years. Returns `None` (and logs) on anything the
    /// calendar rejects.
    pub fn parse_date_literal(&self, literal: &str) -> Option<NaiveDate> {
        let caps = self.date_literal.captures(literal.trim())?;
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year_raw: i32 = caps[3].parse().ok()?;
        let year = expand_year(year_raw, caps[3].len());

        match NaiveDate::from_ymd_opt(year, month, day) {
            Some(date) => Some(date),
            None => {
                warn!(literal, "Could not parse date literal");
                None
            },
        }
    }

    /// Every date literal found anywhere in the text, in order.
    pub fn all_dates(&self, text: &str) -> Vec<NaiveDate> {
        self.date_literal
            .find_iter(text)
            .filter_map(|m| self.parse_date_literal(m.as_str()))
            .collect()
    }
}

fn compile(pattern: &str) -> Regex {
    // Patterns are compile-time constants; a failure here is a
    // programming error caught by the constructor tests.
    #[allow(clippy::expect_used)]
    Regex::new(pattern).expect("invalid temporal pattern")
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| compile(p)).collect()
}

/// Two-digit years map to 20YY when YY is at most 20 years past the
/// current year's suffix, otherwise 19YY.
fn expand_year(year: i32, digits: usize) -> i32 {
    if digits > 2 {
        return year;
    }
    let current_suffix = Utc::now().year() % 100;
    if year <= current_suffix + 20 {
        2000 + year
    } else {
        1900 + year
    }
}

/// Largest char boundary at or below `index`.
fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut index = index;
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
