use std::{
    io::Write,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        vector_index::{
            CollectionSchema, CorpusRecord, MemoryVectorIndex, SearchMode, SurrealVectorIndex,
            VectorHit, VectorIndex,
        },
    },
};
use tempfile::NamedTempFile;
use uuid::Uuid;

use super::{CorpusFiles, CorpusIngestor, IngestionConfig};

struct Corpus {
    vectors: NamedTempFile,
    metadata: NamedTempFile,
}

impl Corpus {
    fn files(&self) -> CorpusFiles {
        CorpusFiles::new(self.vectors.path(), self.metadata.path())
    }
}

fn six_records() -> Vec<(&'static str, Vec<f32>)> {
    vec![
        ("a", vec![1.0, 0.0, 0.0, 0.0]),
        ("b", vec![0.0, 1.0, 0.0, 0.0]),
        ("c", vec![0.0, 0.0, 1.0, 0.0]),
        ("d", vec![0.0, 0.0, 0.0, 1.0]),
        ("e", vec![1.0, 1.0, 0.0, 0.0]),
        ("f", vec![0.0, 0.0, 1.0, 1.0]),
    ]
}

fn write_corpus(vectors: &[Vec<f32>], ids: &[&str]) -> Corpus {
    let mut vector_file = NamedTempFile::new().expect("vector file");
    for row in vectors {
        for value in row {
            vector_file
                .write_all(&value.to_le_bytes())
                .expect("write vector");
        }
    }
    vector_file.flush().expect("flush vectors");

    let mut metadata_file = NamedTempFile::new().expect("metadata file");
    writeln!(metadata_file, "index,id,journal").expect("header");
    for (position, id) in ids.iter().enumerate() {
        writeln!(metadata_file, "{position},{id},arxiv").expect("row");
    }
    metadata_file.flush().expect("flush metadata");

    Corpus {
        vectors: vector_file,
        metadata: metadata_file,
    }
}

fn standard_corpus() -> Corpus {
    let records = six_records();
    let vectors: Vec<Vec<f32>> = records.iter().map(|(_, v)| v.clone()).collect();
    let ids: Vec<&str> = records.iter().map(|(id, _)| *id).collect();
    write_corpus(&vectors, &ids)
}

fn schema() -> CollectionSchema {
    CollectionSchema::new("papers", 4)
}

fn ingestor(index: Arc<dyn VectorIndex>, chunk_size: usize) -> CorpusIngestor {
    CorpusIngestor::new(
        index,
        IngestionConfig::default().with_chunk_size(chunk_size),
    )
}

async fn surreal_index() -> Arc<dyn VectorIndex> {
    let db = SurrealDbClient::memory("ingestion_test", &Uuid::new_v4().to_string())
        .await
        .expect("Failed to create in-memory SurrealDB");
    db.ensure_initialized().await.expect("init");
    Arc::new(SurrealVectorIndex::new(Arc::new(db), SearchMode::Hnsw))
}

#[tokio::test]
async fn three_chunks_then_query_identical_vector() {
    let corpus = standard_corpus();
    let index = surreal_index().await;

    let report = ingestor(index.clone(), 2)
        .ingest(&schema(), &corpus.files())
        .await
        .expect("ingestion succeeds");
    assert_eq!(report.records, 6);
    assert_eq!(report.chunks, 3);

    let hits = index
        .query("papers", &[0.0, 0.0, 1.0, 0.0], 1)
        .await
        .expect("query");
    let ids: Vec<&str> = hits.iter().map(|hit| hit.id.as_str()).collect();
    assert_eq!(ids, vec!["c"]);
}

#[tokio::test]
async fn chunk_size_is_observably_transparent() {
    let corpus = standard_corpus();
    let target = [0.4, 0.3, 0.2, 0.1];
    let mut baseline: Option<Vec<String>> = None;

    for chunk_size in [1, 2, 4, 6, 100] {
        let index: Arc<dyn VectorIndex> = Arc::new(MemoryVectorIndex::new());
        ingestor(index.clone(), chunk_size)
            .ingest(&schema(), &corpus.files())
            .await
            .expect("ingestion succeeds");

        assert_eq!(index.count("papers").await.expect("count"), 6);
        for (id, vector) in six_records() {
            let hits = index.query("papers", &vector, 1).await.expect("query");
            assert_eq!(hits.first().map(|hit| hit.id.as_str()), Some(id));
        }

        let ordering: Vec<String> = index
            .query("papers", &target, 6)
            .await
            .expect("query")
            .into_iter()
            .map(|hit| hit.id)
            .collect();
        match &baseline {
            Some(expected) => assert_eq!(&ordering, expected, "chunk size {chunk_size}"),
            None => baseline = Some(ordering),
        }
    }
}

#[tokio::test]
async fn row_count_mismatch_fails_before_any_commit() {
    let records = six_records();
    let vectors: Vec<Vec<f32>> = records.iter().map(|(_, v)| v.clone()).collect();
    let corpus = write_corpus(&vectors, &["a", "b", "c", "d", "e"]);
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryVectorIndex::new());
    index.ensure_collection(&schema()).await.expect("collection");

    let result = ingestor(index.clone(), 2)
        .ingest(&schema(), &corpus.files())
        .await;

    match result {
        Err(AppError::Ingestion { chunk, .. }) => assert_eq!(chunk, 2),
        other => panic!("expected ingestion error, got {other:?}"),
    }
    assert_eq!(index.count("papers").await.expect("count"), 0);
}

#[tokio::test]
async fn duplicate_ids_in_corpus_abort_without_writes() {
    let records = six_records();
    let vectors: Vec<Vec<f32>> = records.iter().map(|(_, v)| v.clone()).collect();
    let corpus = write_corpus(&vectors, &["a", "b", "c", "d", "e", "b"]);
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryVectorIndex::new());

    let result = ingestor(index.clone(), 4)
        .ingest(&schema(), &corpus.files())
        .await;

    assert!(matches!(result, Err(AppError::Ingestion { chunk: 1, .. })));
    assert!(index.describe("papers").await.expect("describe").is_none());
}

#[tokio::test]
async fn rerun_requires_recreate() {
    let corpus = standard_corpus();
    let index = surreal_index().await;

    ingestor(index.clone(), 3)
        .ingest(&schema(), &corpus.files())
        .await
        .expect("first run");

    let second = ingestor(index.clone(), 3)
        .ingest(&schema(), &corpus.files())
        .await;
    assert!(matches!(second, Err(AppError::Ingestion { chunk: 0, .. })));

    let recreate = CorpusIngestor::new(
        index.clone(),
        IngestionConfig::default()
            .with_chunk_size(3)
            .with_recreate(true),
    );
    let report = recreate
        .ingest(&schema(), &corpus.files())
        .await
        .expect("recreated run");
    assert_eq!(report.records, 6);
    assert_eq!(index.count("papers").await.expect("count"), 6);
}

#[tokio::test]
async fn vector_file_with_wrong_dimension_is_configuration_error() {
    let corpus = standard_corpus();
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryVectorIndex::new());

    let result = ingestor(index, 2)
        .ingest(&CollectionSchema::new("papers", 5), &corpus.files())
        .await;
    assert!(matches!(result, Err(AppError::Configuration(_))));
}

/// Delegates to a memory index and records how many inserts overlap.
#[derive(Default)]
struct OverlapTrackingIndex {
    inner: MemoryVectorIndex,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl VectorIndex for OverlapTrackingIndex {
    async fn ensure_collection(&self, schema: &CollectionSchema) -> Result<(), AppError> {
        self.inner.ensure_collection(schema).await
    }

    async fn drop_collection(&self, name: &str) -> Result<bool, AppError> {
        self.inner.drop_collection(name).await
    }

    async fn describe(&self, name: &str) -> Result<Option<CollectionSchema>, AppError> {
        self.inner.describe(name).await
    }

    async fn insert_batch(
        &self,
        collection: &str,
        records: Vec<CorpusRecord>,
    ) -> Result<usize, AppError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let result = self.inner.insert_batch(collection, records).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorHit>, AppError> {
        self.inner.query(collection, vector, top_k).await
    }

    async fn count(&self, collection: &str) -> Result<usize, AppError> {
        self.inner.count(collection).await
    }
}

#[tokio::test]
async fn concurrent_ingestions_are_serialized() {
    let corpus = standard_corpus();
    let tracking = Arc::new(OverlapTrackingIndex::default());
    let index: Arc<dyn VectorIndex> = tracking.clone();
    let shared = ingestor(index.clone(), 2);
    let other = shared.clone();

    let first_schema = schema();
    let second_schema = CollectionSchema::new("papers_mirror", 4);
    let files = corpus.files();
    let (first, second) = tokio::join!(
        shared.ingest(&first_schema, &files),
        other.ingest(&second_schema, &files)
    );

    assert_eq!(first.expect("first").records, 6);
    assert_eq!(second.expect("second").records, 6);
    assert_eq!(index.count("papers").await.expect("count"), 6);
    assert_eq!(index.count("papers_mirror").await.expect("count"), 6);
    assert_eq!(tracking.max_in_flight.load(Ordering::SeqCst), 1);
}
