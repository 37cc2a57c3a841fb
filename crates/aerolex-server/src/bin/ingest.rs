//! Aerolex ingestion runner
//!
//! Parses a directory of sources, embeds the chunks and writes them to
//! the vector store through the version manager. Sources already
//! recorded in the processing log are skipped on re-runs.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use walkdir::WalkDir;

use aerolex_common::logging::{init_logging, LogConfig, LogLevel};
use aerolex_server::config::Config;
use aerolex_server::context::build_ingestion_pipeline;
use aerolex_server::ingest::IngestionLog;

#[derive(Parser, Debug)]
#[command(name = "aerolex-ingest-sources")]
#[command(author, version, about = "Ingest regulatory sources into the vector store")]
struct Cli {
    /// Kind of sources to ingest
    #[command(subcommand)]
    source: Source,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Source {
    /// Ingest LexML XML documents
    Lexml {
        /// Directory with XML files
        #[arg(short, long)]
        source: PathBuf,

        /// Search recursively
        #[arg(short, long)]
        recursive: bool,
    },

    /// Ingest ICA PDF documents
    Pdfs {
        /// Directory with PDF files
        #[arg(short, long)]
        source: PathBuf,

        /// Search recursively
        #[arg(short, long)]
        recursive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?.with_prefix("aerolex-ingest");
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    let config = Config::load()?;
    let (pipeline, store) = build_ingestion_pipeline(&config)?;

    store
        .ensure_collection(config.embedding.dimension, false)
        .await?;

    let (dir, recursive, extension) = match &cli.source {
        Source::Lexml { source, recursive } => (source, *recursive, "xml"),
        Source::Pdfs { source, recursive } => (source, *recursive, "pdf"),
    };

    let paths = find_sources(dir, recursive, extension)?;
    if paths.is_empty() {
        warn!(dir = %dir.display(), extension, "No sources found");
        return Ok(());
    }
    info!(count = paths.len(), extension, "Found sources");

    let mut log = IngestionLog::load(std::path::Path::new(&config.ingestion.output_dir));
    let summary = pipeline.ingest_paths(paths, &mut log).await;

    info!(
        processed = summary.processed.len(),
        failed = summary.failed.len(),
        skipped = summary.skipped,
        chunks = summary.chunks_ingested,
        superseded = summary.points_superseded,
        "Ingestion complete"
    );
    for (source, error) in &summary.failed {
        warn!(source, error, "Source failed");
    }

    Ok(())
}

fn find_sources(dir: &PathBuf, recursive: bool, extension: &str) -> Result<Vec<PathBuf>> {
    let walker = if recursive {
        WalkDir::new(dir)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let mut paths = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}
