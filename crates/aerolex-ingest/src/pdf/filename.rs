//! Filename-encoded metadata for PDF sources
//!
//! Ingested PDFs follow the contract
//! `{NUMBER}_{ddMMyyyy|vazio}_{ddMMyyyy|vazio}_{CATEGORY}.pdf`, e.g.
//! `ICA-100-12_01052023__trafego-aereo.pdf`. Date fields may be empty.
//! Metadata recovered here takes priority over anything extracted from
//! the document text.

use chrono::NaiveDate;
use std::path::Path;
use tracing::warn;

/// Metadata carried by a conforming filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameMeta {
    /// Document number with the display spacing restored
    /// ("ICA-100-12" -> "ICA 100-12")
    pub number: String,

    pub effective_date: Option<NaiveDate>,

    pub expiry_date: Option<NaiveDate>,

    pub category: Option<String>,
}

/// Parse the filename contract. Returns `None` for filenames that do
/// not follow it; those fall back to text-extracted metadata entirely.
pub fn parse_filename(path: &Path) -> Option<FilenameMeta> {
    let stem = path.file_stem()?.to_str()?;
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() != 4 || parts[0].is_empty() {
        return None;
    }

    Some(FilenameMeta {
        number: display_number(parts[0]),
        effective_date: parse_date_field(parts[1], path),
        expiry_date: parse_date_field(parts[2], path),
        category: (!parts[3].is_empty()).then(|| parts[3].to_string()),
    })
}

fn parse_date_field(field: &str, path: &Path) -> Option<NaiveDate> {
    if field.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(field, "%d%m%Y") {
        Ok(date) => Some(date),
        Err(_) => {
            warn!(
                file = %path.display(),
                field,
                "Filename date field is not ddMMyyyy, ignoring"
            );
            None
        },
    }
}

/// "ICA-100-12" reads "ICA 100-12": the first dash after an alphabetic
/// prefix was a space before the file was named.
fn display_number(raw: &str) -> String {
    let prefix_len = raw.chars().take_while(|c| c.is_alphabetic()).count();
    if prefix_len > 0 && raw[prefix_len..].starts_with('-') {
        format!("{} {}", &raw[..prefix_len], &raw[prefix_len + 1..])
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_full_contract() {
        let meta =
            parse_filename(Path::new("ICA-100-12_01052023_15062024_trafego-aereo.pdf")).unwrap();
        assert_eq!(meta.number, "ICA 100-12");
        assert_eq!(meta.effective_date, Some(date(2023, 5, 1)));
        assert_eq!(meta.expiry_date, Some(date(2024, 6, 15)));
        assert_eq!(meta.category.as_deref(), Some("trafego-aereo"));
    }

    #[test]
    fn test_empty_date_fields_permitted() {
        let meta = parse_filename(Path::new("ICA-63-10___buscas.pdf")).unwrap();
        assert_eq!(meta.number, "ICA 63-10");
        assert_eq!(meta.effective_date, None);
        assert_eq!(meta.expiry_date, None);
        assert_eq!(meta.category.as_deref(), Some("buscas"));
    }

    #[test]
    fn test_nonconforming_filename_rejected() {
        assert_eq!(parse_filename(Path::new("ICA-100-12.pdf")), None);
        assert_eq!(parse_filename(Path::new("relatorio_final.pdf")), None);
        assert_eq!(parse_filename(Path::new("_01052023__x.pdf")), None);
    }

    #[test]
    fn test_garbage_date_field_ignored() {
        let meta = parse_filename(Path::new("ICA-100-12_notadate__cat.pdf")).unwrap();
        assert_eq!(meta.effective_date, None);
    }

    #[test]
    fn test_number_without_alpha_prefix_kept() {
        let meta = parse_filename(Path::new("100-12_01052023__cat.pdf")).unwrap();
        assert_eq!(meta.number, "100-12");
    }
}
