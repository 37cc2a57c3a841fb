//! Aerolex Extract - standalone parser CLI
//!
//! Walks a directory of source documents, runs the structural parsers
//! and the chunker, and writes one JSON file of chunks per document.
//! Lets parser output be inspected without a vector store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use walkdir::WalkDir;

use aerolex_common::logging::{init_logging, LogConfig, LogLevel};
use aerolex_common::types::Chunk;
use aerolex_ingest::pdf::acquire::DisabledOcr;
use aerolex_ingest::{Chunker, LexmlParser, PdfParser, TemporalExtractor};

#[derive(Parser, Debug)]
#[command(name = "aerolex-extract")]
#[command(author, version, about = "Parse regulatory sources into chunk JSON")]
struct Cli {
    /// Directory with source documents (.xml, .pdf)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for chunk JSON files
    #[arg(short, long, default_value = "./data/extracted")]
    output: PathBuf,

    /// Recurse into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Maximum tokens per chunk
    #[arg(long, default_value_t = 512)]
    max_tokens: usize,

    /// Overlap tokens between chunks
    #[arg(long, default_value_t = 50)]
    overlap: usize,

    /// Days added to the publication date when no vigor clause resolves
    #[arg(long, default_value_t = 90)]
    effective_days: u32,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env().unwrap_or_default().with_prefix("aerolex-extract");
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    let sources = find_sources(&cli.input, cli.recursive)?;
    if sources.is_empty() {
        warn!(input = %cli.input.display(), "No .xml or .pdf sources found");
        return Ok(());
    }
    info!(count = sources.len(), "Found source documents");

    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("creating output directory {}", cli.output.display()))?;

    let lexml = LexmlParser::new(TemporalExtractor::new(cli.effective_days));
    let pdf = PdfParser::new(
        TemporalExtractor::new(cli.effective_days),
        Box::new(DisabledOcr),
    );
    let chunker = Chunker::new(cli.max_tokens, cli.overlap);

    let bar = ProgressBar::new(sources.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut ok = 0usize;
    let mut failed = 0usize;
    for source in &sources {
        bar.set_message(
            source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        match extract_one(source, &lexml, &pdf, &chunker) {
            Ok(chunks) => {
                write_chunks(&cli.output, source, &chunks, cli.pretty)?;
                ok += 1;
            },
            Err(e) => {
                warn!(source = %source.display(), error = %e, "Extraction failed");
                failed += 1;
            },
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    info!(ok, failed, "Extraction finished");
    Ok(())
}

fn find_sources(input: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let walker = if recursive {
        WalkDir::new(input)
    } else {
        WalkDir::new(input).max_depth(1)
    };

    let mut sources = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        match entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("xml") | Some("pdf") => sources.push(entry.into_path()),
            _ => {},
        }
    }
    sources.sort();
    Ok(sources)
}

fn extract_one(
    source: &Path,
    lexml: &LexmlParser,
    pdf: &PdfParser,
    chunker: &Chunker,
) -> Result<Vec<Chunk>> {
    let is_xml = source
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("xml"))
        .unwrap_or(false);

    let units = if is_xml {
        lexml.parse_file(source)?
    } else {
        pdf.parse_file(source)?
    };

    let chunks: Vec<Chunk> = units.iter().flat_map(|u| chunker.chunk_unit(u)).collect();
    info!(
        source = %source.display(),
        units = units.len(),
        chunks = chunks.len(),
        "Extracted document"
    );
    Ok(chunks)
}

fn write_chunks(output: &Path, source: &Path, chunks: &[Chunk], pretty: bool) -> Result<()> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let path = output.join(format!("{stem}.json"));

    let json = if pretty {
        serde_json::to_string_pretty(chunks)?
    } else {
        serde_json::to_string(chunks)?
    };
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
