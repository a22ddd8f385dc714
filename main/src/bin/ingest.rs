use std::path::PathBuf;

use clap::Parser;
use common::storage::collection::PaperCollection;
use ingestion_pipeline::{CorpusFiles, CorpusIngestor, IngestionConfig};
use paper_scout::{connect_db, init_tracing, load_config, vector_index};
use tracing::info;

/// Bulk-load the precomputed embedding corpus into the vector collection.
#[derive(Debug, Parser)]
#[command(name = "ingest", version)]
struct Cli {
    /// Drop the collection before loading
    #[arg(long)]
    recreate: bool,

    /// Rows per insert batch
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Raw little-endian f32 vector file
    #[arg(long)]
    vectors: Option<PathBuf>,

    /// CSV metadata file aligned row-for-row with the vectors
    #[arg(long)]
    metadata: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config()?;

    let mut files = CorpusFiles::from_app_config(&config);
    if let Some(vectors) = cli.vectors {
        files.vectors = vectors;
    }
    if let Some(metadata) = cli.metadata {
        files.metadata = metadata;
    }

    let mut ingestion = IngestionConfig::from_app_config(&config).with_recreate(cli.recreate);
    if let Some(chunk_size) = cli.chunk_size {
        ingestion = ingestion.with_chunk_size(chunk_size);
    }

    let db = connect_db(&config).await?;
    let ingestor = CorpusIngestor::new(vector_index(db, &config), ingestion);
    let schema = PaperCollection::schema_from_config(&config);

    let report = ingestor.ingest(&schema, &files).await?;
    info!(elapsed = ?report.elapsed, "Ingestion complete");
    println!(
        "Ingested {} records into '{}' in {} chunks",
        report.records, report.collection, report.chunks
    );
    Ok(())
}
