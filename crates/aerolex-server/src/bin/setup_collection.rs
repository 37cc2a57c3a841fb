//! Collection bootstrap
//!
//! Creates the vector collection with the configured HNSW parameters
//! and payload indexes, idempotently, then prints its statistics.

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use aerolex_common::logging::{init_logging, LogConfig};
use aerolex_server::config::Config;
use aerolex_server::store::QdrantStore;

#[derive(Parser, Debug)]
#[command(name = "aerolex-setup-collection")]
#[command(author, version, about = "Initialize the vector store collection")]
struct Cli {
    /// Drop and recreate the collection if it already exists
    #[arg(long)]
    recreate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env()?.with_prefix("aerolex-setup");
    init_logging(&log_config)?;

    let config = Config::load()?;
    let store = QdrantStore::new(config.store.clone())?;

    if cli.recreate {
        warn!("Recreating the collection drops every ingested chunk");
    }

    let created = store
        .ensure_collection(config.embedding.dimension, cli.recreate)
        .await?;
    info!(
        collection = store.collection(),
        created, "Collection setup completed"
    );

    let info = store.collection_info().await?;
    info!(
        vectors = info.vectors_count,
        points = info.points_count,
        status = %info.status,
        "Collection statistics"
    );

    Ok(())
}
