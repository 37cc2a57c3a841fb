//! Textual acquisition phase of the PDF parser
//!
//! Page by page: prefer the embedded text layer; when a page has none,
//! hand it to the OCR oracle, an external callback (this crate never
//! rasterizes or recognizes anything itself). Page outputs are
//! concatenated with a sentinel line preserved for debugging.

use std::path::Path;

use tracing::{debug, warn};

use aerolex_common::types::DocKind;
use aerolex_common::{AerolexError, Result};

/// Sentinel line separating pages in the concatenated text.
pub const PAGE_SENTINEL: &str = "--- PÁGINA ---";

/// Fraction of near-white pixels above which a rasterized page counts
/// as visually blank.
pub const BLANK_PAGE_THRESHOLD: f64 = 0.98;

/// External OCR callback. Implementations rasterize and recognize; the
/// parser only consumes the text.
pub trait OcrOracle: Send + Sync {
    /// Recognize one page. `Ok(None)` means the page is visually blank
    /// and carries no text at all.
    fn recognize_page(&self, pdf_path: &Path, page_index: usize) -> Result<Option<String>>;
}

/// OCR turned off: image-only pages come back empty.
pub struct DisabledOcr;

impl OcrOracle for DisabledOcr {
    fn recognize_page(&self, pdf_path: &Path, page_index: usize) -> Result<Option<String>> {
        debug!(
            pdf = %pdf_path.display(),
            page = page_index,
            "OCR disabled, skipping image-only page"
        );
        Ok(None)
    }
}

/// Decide whether a rasterized grayscale page is blank: the share of
/// near-white pixels exceeds `threshold`. Used by OCR implementations
/// before spending recognition time on a page.
pub fn is_visually_blank(gray_pixels: &[u8], threshold: f64) -> bool {
    if gray_pixels.is_empty() {
        return true;
    }
    let near_white = gray_pixels.iter().filter(|&&p| p > 230).count();
    (near_white as f64 / gray_pixels.len() as f64) > threshold
}

/// Extract per-page text from a PDF, falling back to the OCR oracle on
/// pages without a text layer.
pub fn extract_pages(path: &Path, ocr: &dyn OcrOracle) -> Result<Vec<String>> {
    let raw_pages = pdf_extract::extract_text_by_pages(path).map_err(|e| {
        AerolexError::Parse(format!("unreadable PDF {}: {e}", path.display()))
    })?;

    let mut pages = Vec::with_capacity(raw_pages.len());
    for (index, text) in raw_pages.into_iter().enumerate() {
        if text.trim().is_empty() {
            match ocr.recognize_page(path, index) {
                Ok(Some(recognized)) => pages.push(recognized),
                Ok(None) => pages.push(String::new()),
                Err(e) => {
                    // A failed page is recoverable: skip it, keep the rest.
                    warn!(
                        pdf = %path.display(),
                        page = index,
                        error = %e,
                        "OCR failed for page, emitting it empty"
                    );
                    pages.push(String::new());
                },
            }
        } else {
            pages.push(text);
        }
    }

    debug!(pdf = %path.display(), pages = pages.len(), "Acquired page text");
    Ok(pages)
}

/// Concatenate pages, each introduced by the sentinel line.
pub fn concatenate_pages(pages: &[String]) -> String {
    let mut out = String::new();
    for page in pages {
        out.push_str(PAGE_SENTINEL);
        out.push('\n');
        out.push_str(page.trim_end());
        out.push('\n');
    }
    out
}

/// How many leading pages to drop as front matter, per document kind.
///
/// Only the ICA policy is populated: the duplicated cover pages, their
/// blank verso pages, and the table-of-contents page (recognized by the
/// density of dotted page-number runs). Anything else keeps all pages.
pub fn front_matter_skip(pages: &[String], kind: DocKind) -> usize {
    if kind != DocKind::Ica || pages.is_empty() {
        return 0;
    }

    let cover = normalize_page(&pages[0]);
    let cover_duplicated = !cover.is_empty()
        && pages
            .iter()
            .take(4)
            .skip(1)
            .any(|p| normalize_page(p) == cover);
    if !cover_duplicated {
        // Nothing that looks like the duplicated-cover layout; keep
        // every page rather than guess.
        return 0;
    }

    let mut skip = 1;
    for (i, page) in pages.iter().enumerate().take(8).skip(1) {
        let normalized = normalize_page(page);
        let droppable =
            normalized.is_empty() || normalized == cover || is_toc_page(page);
        if droppable {
            skip = i + 1;
        } else {
            break;
        }
    }
    skip
}

/// A table-of-contents page: several lines ending in a dotted leader
/// and a page number.
pub fn is_toc_page(page: &str) -> bool {
    let leader_lines = page
        .lines()
        .filter(|line| {
            let trimmed = line.trim_end();
            match trimmed
                .char_indices()
                .rev()
                .find(|(_, c)| !c.is_ascii_digit() && *c != ' ')
            {
                Some((pos, c)) => {
                    let after = pos + c.len_utf8();
                    let tail_has_number =
                        trimmed[after..].trim().chars().any(|c| c.is_ascii_digit());
                    tail_has_number && trimmed[..after].ends_with("....")
                },
                None => false,
            }
        })
        .count();
    leader_lines >= 3
}

fn normalize_page(page: &str) -> String {
    page.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_page_detection() {
        let white = vec![255u8; 1000];
        assert!(is_visually_blank(&white, BLANK_PAGE_THRESHOLD));

        let mut mostly_white = vec![255u8; 1000];
        for p in mostly_white.iter_mut().take(50) {
            *p = 0;
        }
        assert!(!is_visually_blank(&mostly_white, BLANK_PAGE_THRESHOLD));

        assert!(is_visually_blank(&[], BLANK_PAGE_THRESHOLD));
    }

    #[test]
    fn test_concatenate_preserves_sentinels() {
        let pages = vec!["página um".to_string(), "página dois".to_string()];
        let text = concatenate_pages(&pages);
        assert_eq!(text.matches(PAGE_SENTINEL).count(), 2);
        assert!(text.contains("página um\n"));
    }

    #[test]
    fn test_toc_page_detection() {
        let toc = "\
ÍNDICE
1 DISPOSIÇÕES PRELIMINARES ........................ 7
1.1 FINALIDADE .................................... 7
2 TRÁFEGO AÉREO ................................... 9
2.1 REGRAS GERAIS ................................ 11
";
        assert!(is_toc_page(toc));
        assert!(!is_toc_page("1.1 FINALIDADE\ntexto corrido sem líderes\n"));
    }

    #[test]
    fn test_front_matter_skip_for_ica() {
        let cover = "MINISTÉRIO DA DEFESA\nICA 100-12\nREGRAS DO AR\n2023".to_string();
        let toc = "ÍNDICE\n1 X ........ 5\n1.1 Y ........ 6\n2 Z ........ 9\n".to_string();
        let pages = vec![
            cover.clone(),
            String::new(),
            cover.clone(),
            toc,
            "1 DISPOSIÇÕES PRELIMINARES\ncorpo".to_string(),
        ];
        assert_eq!(front_matter_skip(&pages, DocKind::Ica), 4);
    }

    #[test]
    fn test_front_matter_kept_without_duplicate_cover() {
        let pages = vec![
            "CAPA ÚNICA".to_string(),
            "1 SEÇÃO\ncorpo".to_string(),
        ];
        assert_eq!(front_matter_skip(&pages, DocKind::Ica), 0);
    }

    #[test]
    fn test_front_matter_not_applied_to_other_kinds() {
        let cover = "CAPA".to_string();
        let pages = vec![cover.clone(), cover.clone(), "corpo".to_string()];
        assert_eq!(front_matter_skip(&pages, DocKind::Other), 0);
        assert_eq!(front_matter_skip(&pages, DocKind::Ica), 2);
    }

    #[test]
    fn test_disabled_ocr_returns_blank() {
        let ocr = DisabledOcr;
        let result = ocr
            .recognize_page(Path::new("x.pdf"), 0)
            .expect("disabled OCR never fails");
        assert_eq!(result, None);
    }
}
