//! PDF structural parser for ICAs and other scanned regulations
//!
//! Two strictly separated phases:
//!
//! 1. **Acquisition** ([`acquire`]): per-page text from the embedded
//!    text layer, falling back to an external OCR oracle; pages are
//!    concatenated with sentinel lines.
//! 2. **Structure** ([`sections`]): dotted-decimal section headers are
//!    scanned over the concatenated text and bodies sliced between
//!    them.
//!
//! Filename-encoded metadata ([`filename`]) takes priority over
//! anything recovered from the text.

pub mod acquire;
pub mod filename;
pub mod sections;

use std::path::Path;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info};

use aerolex_common::types::{DocKind, DocumentMeta, RegulatoryUnit};
use aerolex_common::Result;

use crate::temporal::TemporalExtractor;
use acquire::{concatenate_pages, extract_pages, front_matter_skip, OcrOracle, PAGE_SENTINEL};
use filename::{parse_filename, FilenameMeta};
use sections::SectionScanner;

/// Parser for PDF documents (ICAs, regulations).
pub struct PdfParser {
    temporal: TemporalExtractor,
    scanner: SectionScanner,
    ocr: Box<dyn OcrOracle>,
    ica_number: Regex,
    written_date: Regex,
}

impl PdfParser {
    pub fn new(temporal: TemporalExtractor, ocr: Box<dyn OcrOracle>) -> Self {
        #[allow(clippy::expect_used)]
        let ica_number = Regex::new(r"(?i)ICA\s+(\d+-\d+)").expect("invalid ICA number pattern");
        // "21 de junho de 1993", tolerant of OCR casing
        #[allow(clippy::expect_used)]
        let written_date = Regex::new(r"(?i)(\d{1,2})\s+de\s+([a-zçã]+)\s+de\s+(\d{4})")
            .expect("invalid written date pattern");
        Self {
            temporal,
            scanner: SectionScanner::new(),
            ocr,
            ica_number,
            written_date,
        }
    }

    /// Parse one PDF into numbered-section units.
    pub fn parse_file(&self, path: &Path) -> Result<Vec<RegulatoryUnit>> {
        let meta_from_name = parse_filename(path);
        let pages = extract_pages(path, self.ocr.as_ref())?;
        self.parse_pages(&pages, &path.display().to_string(), meta_from_name)
    }

    /// Structural phase over already-acquired pages. Public so the
    /// scan logic is testable without PDF fixtures.
    pub fn parse_pages(
        &self,
        pages: &[String],
        source: &str,
        meta_from_name: Option<FilenameMeta>,
    ) -> Result<Vec<RegulatoryUnit>> {
        let first_page = pages.first().map(String::as_str).unwrap_or_default();
        let number = meta_from_name
            .as_ref()
            .map(|m| m.number.clone())
            .or_else(|| self.extract_ica_number(first_page))
            .unwrap_or_else(|| {
                Path::new(source)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "unknown".to_string())
            });

        let kind = if number.to_uppercase().starts_with("ICA") {
            DocKind::Ica
        } else {
            DocKind::Other
        };

        let document = DocumentMeta {
            urn: None,
            authority: None,
            kind,
            number: number.clone(),
            publication_date: self.extract_written_date(first_page),
            title: None,
            source: source.to_string(),
            category: meta_from_name.as_ref().and_then(|m| m.category.clone()),
        };

        let skip = front_matter_skip(pages, kind);
        if skip > 0 {
            debug!(source, pages = skip, "Dropped front-matter pages");
        }
        let text = concatenate_pages(&pages[skip..]);

        let sections = self.scanner.scan_sections(&text);
        let units = if sections.is_empty() {
            // No structure recognized: the whole document is one unit.
            info!(source, "No section headers found, emitting whole document");
            let body = strip_sentinels(&text);
            vec![self.build_unit(
                format!("{number}-sec-1"),
                number.clone(),
                String::new(),
                Vec::new(),
                body,
                &document,
                meta_from_name.as_ref(),
            )]
        } else {
            sections
                .into_iter()
                .map(|section| {
                    self.build_unit(
                        format!("{}-sec-{}", number, section.header.number),
                        section.header.label(),
                        section.header.title.clone(),
                        section.context,
                        strip_sentinels(&section.body),
                        &document,
                        meta_from_name.as_ref(),
                    )
                })
                .collect()
        };

        info!(source, units = units.len(), "Parsed PDF document");
        Ok(units)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_unit(
        &self,
        regulation_id: String,
        label: String,
        title: String,
        context: Vec<String>,
        body: String,
        document: &DocumentMeta,
        meta_from_name: Option<&FilenameMeta>,
    ) -> RegulatoryUnit {
        let text = if body.is_empty() {
            label.clone()
        } else {
            format!("{label}\n\n{body}")
        };

        let mut temporal = self.temporal.extract(&text, document.publication_date);
        // The filename contract wins over text-extracted dates.
        if let Some(meta) = meta_from_name {
            if meta.effective_date.is_some() {
                temporal.effective_date = meta.effective_date;
            }
            if meta.expiry_date.is_some() {
                temporal.expiry_date = meta.expiry_date;
            }
        }

        RegulatoryUnit {
            regulation_id,
            label,
            title,
            context,
            text,
            temporal,
            document: document.clone(),
        }
    }

    fn extract_ica_number(&self, first_page: &str) -> Option<String> {
        self.ica_number
            .captures(first_page)
            .map(|caps| format!("ICA {}", &caps[1]))
    }

    /// Publication date written out in Portuguese on the cover page
    /// ("21 de junho de 1993").
    fn extract_written_date(&self, first_page: &str) -> Option<NaiveDate> {
        let caps = self.written_date.captures(first_page)?;
        let day: u32 = caps[1].parse().ok()?;
        let month = month_number(&caps[2].to_lowercase())?;
        let year: i32 = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

fn month_number(name: &str) -> Option<u32> {
    let number = match name {
        "janeiro" => 1,
        "fevereiro" => 2,
        "março" | "marco" => 3,
        "abril" => 4,
        "maio" => 5,
        "junho" => 6,
        "julho" => 7,
        "agosto" => 8,
        "setembro" => 9,
        "outubro" => 10,
        "novembro" => 11,
        "dezembro" => 12,
        _ => return None,
    };
    Some(number)
}

/// Remove the page sentinel lines from a body before it becomes unit
/// text. The sentinels only exist for debugging the acquisition phase.
fn strip_sentinels(text: &str) -> String {
    text.lines()
        .filter(|line| line.trim() != PAGE_SENTINEL)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use super::acquire::DisabledOcr;

    fn parser() -> PdfParser {
        PdfParser::new(TemporalExtractor::new(90), Box::new(DisabledOcr))
    }

    fn ica_pages() -> Vec<String> {
        vec![
            "MINISTÉRIO DA DEFESA\nICA 100-12\nREGRAS DO AR\n21 de junho de 2023".to_string(),
            "1 DISPOSIÇÕES PRELIMINARES\n\n1.1 FINALIDADE\nRegular o serviço de tráfego aéreo.\n\n1.2 ÂMBITO\nAplica-se a todo o SISCEAB.".to_string(),
            "2 CONCEITOS\n\n2.1 Aeródromo é a área destinada a pouso.".to_string(),
        ]
    }

    #[test]
    fn test_units_per_section() {
        let units = parser().parse_pages(&ica_pages(), "ica.pdf", None).unwrap();
        let ids: Vec<&str> = units.iter().map(|u| u.regulation_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "ICA 100-12-sec-1",
                "ICA 100-12-sec-1.1",
                "ICA 100-12-sec-1.2",
                "ICA 100-12-sec-2",
                "ICA 100-12-sec-2.1",
            ]
        );
    }

    #[test]
    fn test_document_metadata_from_first_page() {
        let units = parser().parse_pages(&ica_pages(), "ica.pdf", None).unwrap();
        let doc = &units[0].document;
        assert_eq!(doc.kind, DocKind::Ica);
        assert_eq!(doc.number, "ICA 100-12");
        assert_eq!(
            doc.publication_date,
            NaiveDate::from_ymd_opt(2023, 6, 21)
        );
    }

    #[test]
    fn test_section_text_prefixed_with_label() {
        let units = parser().parse_pages(&ica_pages(), "ica.pdf", None).unwrap();
        let finalidade = units
            .iter()
            .find(|u| u.regulation_id.ends_with("sec-1.1"))
            .unwrap();
        assert_eq!(
            finalidade.text,
            "1.1 FINALIDADE\n\nRegular o serviço de tráfego aéreo."
        );
        assert_eq!(finalidade.context, vec!["1 DISPOSIÇÕES PRELIMINARES"]);
    }

    #[test]
    fn test_untitled_leaf_unit() {
        let units = parser().parse_pages(&ica_pages(), "ica.pdf", None).unwrap();
        let leaf = units
            .iter()
            .find(|u| u.regulation_id.ends_with("sec-2.1"))
            .unwrap();
        assert_eq!(leaf.label, "2.1");
        assert_eq!(leaf.title, "");
        assert!(leaf.text.contains("Aeródromo é a área destinada a pouso."));
    }

    #[test]
    fn test_whole_document_fallback() {
        let pages = vec!["Texto corrido sem qualquer estrutura numerada.".to_string()];
        let units = parser().parse_pages(&pages, "livre.pdf", None).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].regulation_id, "livre-sec-1");
        assert!(units[0].text.contains("Texto corrido"));
        assert!(!units[0].text.contains(PAGE_SENTINEL));
    }

    #[test]
    fn test_filename_dates_take_priority() {
        let meta = parse_filename(Path::new("ICA-100-12_01052023_15062024_trafego.pdf"));
        let pages = vec![
            "ICA 100-12\n1 SEÇÃO ÚNICA\nEsta instrução entra em vigor em 01/01/2000.".to_string(),
        ];
        let units = parser().parse_pages(&pages, "ICA-100-12_01052023_15062024_trafego.pdf", meta).unwrap();
        assert_eq!(
            units[0].temporal.effective_date,
            NaiveDate::from_ymd_opt(2023, 5, 1)
        );
        assert_eq!(
            units[0].temporal.expiry_date,
            NaiveDate::from_ymd_opt(2024, 6, 15)
        );
        assert_eq!(units[0].document.category.as_deref(), Some("trafego"));
    }

    #[test]
    fn test_sentinels_stripped_from_bodies() {
        let pages = vec![
            "1 SEÇÃO LONGA\nprimeira parte".to_string(),
            "segunda parte na página seguinte".to_string(),
        ];
        let units = parser().parse_pages(&pages, "x.pdf", None).unwrap();
        assert!(!units[0].text.contains(PAGE_SENTINEL));
        assert!(units[0].text.contains("primeira parte"));
        assert!(units[0].text.contains("segunda parte"));
    }

    #[test]
    fn test_month_names() {
        assert_eq!(month_number("janeiro"), Some(1));
        assert_eq!(month_number("dezembro"), Some(12));
        assert_eq!(month_number("meszembro"), None);
    }
}
