mod config;

pub use config::{IngestionConfig, IngestionTuning};

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::vector_index::{CollectionSchema, CorpusRecord, VectorIndex},
    utils::config::AppConfig,
};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::corpus::{MetadataReader, VectorFile};

/// The vector/metadata file pair making up a corpus.
#[derive(Debug, Clone)]
pub struct CorpusFiles {
    pub vectors: PathBuf,
    pub metadata: PathBuf,
}

impl CorpusFiles {
    pub fn new(vectors: impl Into<PathBuf>, metadata: impl Into<PathBuf>) -> Self {
        Self {
            vectors: vectors.into(),
            metadata: metadata.into(),
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(&config.corpus_vectors_path, &config.corpus_metadata_path)
    }
}

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub collection: String,
    pub records: usize,
    pub chunks: usize,
    pub elapsed: Duration,
}

/// Loads a memory-mapped embedding corpus into a [`VectorIndex`] chunk by chunk.
///
/// Chunks are inserted strictly in file order. Clones share one lock, so only
/// one ingestion runs at a time per ingestor.
#[derive(Clone)]
pub struct CorpusIngestor {
    index: Arc<dyn VectorIndex>,
    config: IngestionConfig,
    exclusive: Arc<Mutex<()>>,
}

impl CorpusIngestor {
    pub fn new(index: Arc<dyn VectorIndex>, config: IngestionConfig) -> Self {
        Self {
            index,
            config,
            exclusive: Arc::new(Mutex::new(())),
        }
    }

    /// Runs a full ingestion.
    ///
    /// Row counts and ids are verified before anything is written; a mismatch
    /// fails with [`AppError::Ingestion`] naming the first misaligned chunk.
    /// A failed insert aborts the run with the index of the failing chunk.
    #[tracing::instrument(
        skip_all,
        fields(collection = %schema.name, chunk_size = self.config.tuning.chunk_size)
    )]
    pub async fn ingest(
        &self,
        schema: &CollectionSchema,
        files: &CorpusFiles,
    ) -> Result<IngestionReport, AppError> {
        let _exclusive = self.exclusive.lock().await;
        let started = Instant::now();

        schema.validate()?;
        let chunk_size = self.config.tuning.chunk_size;
        if chunk_size == 0 {
            return Err(AppError::Configuration(
                "ingestion chunk size must be greater than zero".into(),
            ));
        }

        info!(
            vectors = %files.vectors.display(),
            metadata = %files.metadata.display(),
            "Starting bulk insert"
        );
        let vectors = VectorFile::open(&files.vectors, schema.dimension)?;
        let total_rows = {
            let schema = schema.clone();
            let metadata = files.metadata.clone();
            let vector_rows = vectors.rows();
            tokio::task::spawn_blocking(move || {
                preflight(&schema, &metadata, vector_rows, chunk_size)
            })
            .await??
        };
        let chunks = total_rows.div_ceil(chunk_size);
        info!(records = total_rows, chunks, "Corpus verified");

        if self.config.recreate && self.index.drop_collection(&schema.name).await? {
            info!("Dropped existing collection");
        }
        self.index.ensure_collection(schema).await?;

        let mut metadata = MetadataReader::open(&files.metadata)?;
        let mut inserted = 0usize;
        for chunk in 0..chunks {
            let first_row = chunk * chunk_size;
            let rows = metadata.next_chunk(chunk_size)?;
            let chunk_vectors = vectors.read_rows(first_row, chunk_size)?;
            if rows.len() != chunk_vectors.len() {
                return Err(AppError::Ingestion {
                    chunk,
                    reason: format!(
                        "corpus files changed during ingestion: {} metadata rows for {} vectors",
                        rows.len(),
                        chunk_vectors.len()
                    ),
                });
            }

            let records: Vec<CorpusRecord> = rows
                .into_iter()
                .zip(chunk_vectors)
                .map(|(row, vector)| CorpusRecord {
                    id: row.id,
                    vector,
                    label: row.label,
                })
                .collect();

            info!(
                chunk = chunk + 1,
                chunks,
                first_row,
                records = records.len(),
                "Inserting chunk"
            );
            let count = self
                .index
                .insert_batch(&schema.name, records)
                .await
                .map_err(|err| {
                    error!(chunk = chunk + 1, error = %err, "Failed to insert chunk");
                    AppError::Ingestion {
                        chunk,
                        reason: err.to_string(),
                    }
                })?;
            inserted = inserted.saturating_add(count);
        }

        let elapsed = started.elapsed();
        info!(
            records = inserted,
            chunks,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Data insertion completed successfully"
        );

        Ok(IngestionReport {
            collection: schema.name.clone(),
            records: inserted,
            chunks,
            elapsed,
        })
    }
}

/// Walks the metadata once, checking ids and the row count against the vector file.
fn preflight(
    schema: &CollectionSchema,
    metadata: &Path,
    vector_rows: usize,
    chunk_size: usize,
) -> Result<usize, AppError> {
    let mut seen = HashSet::new();
    let mut rows = 0usize;

    for (position, row) in MetadataReader::open(metadata)?.enumerate() {
        let row = row?;
        let chunk = position / chunk_size;
        if row.id.is_empty() || row.id.len() > schema.max_id_length {
            return Err(AppError::Ingestion {
                chunk,
                reason: format!(
                    "row {position} has id '{}', ids must be 1..={} characters",
                    row.id, schema.max_id_length
                ),
            });
        }
        if !seen.insert(row.id) {
            return Err(AppError::Ingestion {
                chunk,
                reason: format!("row {position} repeats an earlier id"),
            });
        }
        rows = position + 1;
    }

    if rows != vector_rows {
        return Err(AppError::Ingestion {
            chunk: rows.min(vector_rows) / chunk_size,
            reason: format!(
                "metadata has {rows} rows but the vector file has {vector_rows}"
            ),
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests;
