//! Structural phase of the PDF parser
//!
//! Scans the concatenated page text for dotted-decimal section headers
//! (`2.1 FINALIDADE`) and slices section bodies between consecutive
//! headers. Hierarchy depth equals dot depth; ancestors are resolved by
//! longest-prefix matching on the section number.
//!
//! This phase knows nothing about PDFs; it operates on plain text so it
//! can be tested without fixtures.

use regex::Regex;

/// A detected section header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    /// Dotted section number ("2.1.4")
    pub number: String,

    /// Uppercase heading text; empty for label-only numbered items
    pub title: String,

    /// Byte offset of the start of the header line
    pub start: usize,

    /// Byte offset where the section body begins
    pub body_start: usize,
}

impl SectionHeader {
    /// Hierarchical level: dot depth, 1-based.
    pub fn level(&self) -> usize {
        self.number.split('.').count()
    }

    /// Display label: number plus title when present.
    pub fn label(&self) -> String {
        if self.title.is_empty() {
            self.number.clone()
        } else {
            format!("{} {}", self.number, self.title)
        }
    }

    /// Dotted prefixes of the number, shortest first ("2.3.1" -> "2", "2.3").
    pub fn ancestor_numbers(&self) -> Vec<String> {
        let parts: Vec<&str> = self.number.split('.').collect();
        (1..parts.len()).map(|n| parts[..n].join(".")).collect()
    }
}

/// A section sliced out of the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub header: SectionHeader,

    /// Labels of the ancestors, outermost first
    pub context: Vec<String>,

    /// Body text (header line stripped)
    pub body: String,
}

/// Scanner holding the compiled header pattern.
pub struct SectionScanner {
    header_line: Regex,
}

impl Default for SectionScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionScanner {
    pub fn new() -> Self {
        // A candidate is any line opening with a dotted-decimal run;
        // classification of the remainder happens in code.
        #[allow(clippy::expect_used)]
        let header_line = Regex::new(r"(?m)^[ \t]*(\d+(?:\.\d+)*)[ \t]+(\S[^\n]*?)[ \t]*$")
            .expect("invalid header pattern");
        Self { header_line }
    }

    /// Find all section headers in `text`, in document order.
    pub fn scan_headers(&self, text: &str) -> Vec<SectionHeader> {
        let mut headers = Vec::new();
        for caps in self.header_line.captures_iter(text) {
            let (Some(whole), Some(number), Some(rest)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };

            let rest_text = rest.as_str();
            if is_uppercase_title(rest_text) {
                headers.push(SectionHeader {
                    number: number.as_str().to_string(),
                    title: rest_text.to_string(),
                    start: whole.start(),
                    body_start: line_end(text, whole.end()),
                });
            } else if number.as_str().contains('.') {
                // Sub-ordinated numbered item without a heading: the
                // remainder of the line is body, not title.
                headers.push(SectionHeader {
                    number: number.as_str().to_string(),
                    title: String::new(),
                    start: whole.start(),
                    body_start: rest.start(),
                });
            }
            // A bare integer followed by lowercase text is prose
            // ("15 de junho de 2023"), not a boundary.
        }
        headers
    }

    /// Scan and slice: every header becomes a [`Section`] whose body
    /// runs to the next header of any level.
    pub fn scan_sections(&self, text: &str) -> Vec<Section> {
        let headers = self.scan_headers(text);
        let mut sections = Vec::with_capacity(headers.len());

        for (i, header) in headers.iter().enumerate() {
            let body_end = headers
                .get(i + 1)
                .map(|next| next.start)
                .unwrap_or(text.len());
            let body = text[header.body_start..body_end].trim().to_string();

            let context = resolve_context(&headers[..i], header);
            sections.push(Section {
                header: header.clone(),
                context,
                body,
            });
        }

        sections
    }
}

/// Ancestor labels by longest-prefix matching against the headers seen
/// so far; the nearest preceding header with a prefix number wins.
fn resolve_context(preceding: &[SectionHeader], header: &SectionHeader) -> Vec<String> {
    header
        .ancestor_numbers()
        .into_iter()
        .filter_map(|number| {
            preceding
                .iter()
                .rev()
                .find(|h| h.number == number)
                .map(SectionHeader::label)
        })
        .collect()
}

/// Characters OCR habitually emits in place of `Í`/`I` inside
/// uppercase headings. They never disqualify a heading.
const OCR_CONFUSABLES: [char; 4] = ['i', 'l', '1', '|'];

/// An uppercase heading: at least one uppercase letter, and no
/// lowercase ones other than the OCR confusables (a scanned
/// "DiSPOSlÇÕES" is still a heading). Digits, accents and punctuation
/// are fine.
fn is_uppercase_title(text: &str) -> bool {
    let mut has_upper = false;
    for ch in text.chars() {
        if OCR_CONFUSABLES.contains(&ch) {
            continue;
        }
        if ch.is_lowercase() {
            return false;
        }
        if ch.is_uppercase() {
            has_upper = true;
        }
    }
    has_upper
}

/// Byte offset just past the newline terminating the line containing
/// (or ending at) `from`.
fn line_end(text: &str, from: usize) -> usize {
    match text[from..].find('\n') {
        Some(pos) => from + pos + 1,
        None => text.len(),
    }
}
