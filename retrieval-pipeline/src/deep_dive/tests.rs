use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use common::{
    storage::vector_index::{
        CollectionSchema, CorpusRecord, MemoryVectorIndex, VectorHit, VectorIndex,
    },
    utils::embedding::{hashed_embedding, EmbeddingProvider},
};

use super::*;
use crate::{
    extraction::SeedAnalysis,
    pipeline::ScoringConfig,
    test_support::{paper, ScriptedScorer},
};

const DIM: usize = 32;

struct StaticSource {
    papers: Vec<Paper>,
    fetches: AtomicUsize,
}

#[async_trait]
impl PaperSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<String, AppError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::to_string(&self.papers)?)
    }

    fn parse(&self, raw: &str) -> Result<Vec<Paper>, AppError> {
        Ok(serde_json::from_str(raw)?)
    }
}

struct ScriptedExtractor {
    terms: Option<Vec<String>>,
}

#[async_trait]
impl TermExtractor for ScriptedExtractor {
    async fn extract(
        &self,
        _paper: &Paper,
        _research_interests: &[String],
        n_terms: usize,
    ) -> Result<SeedAnalysis, AppError> {
        match &self.terms {
            Some(terms) => Ok(SeedAnalysis {
                detailed_summary: "Seed deep summary".to_string(),
                relevance: Some(93),
                search_terms: terms.iter().take(n_terms).cloned().collect(),
            }),
            None => Err(AppError::Extraction("oracle unavailable".to_string())),
        }
    }
}

/// Delegates to an in-memory index and counts queries.
struct CountingIndex {
    inner: MemoryVectorIndex,
    queries: AtomicUsize,
}

#[async_trait]
impl VectorIndex for CountingIndex {
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
        self.inner.insert_batch(collection, records).await
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorHit>, AppError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(collection, vector, top_k).await
    }

    async fn count(&self, collection: &str) -> Result<usize, AppError> {
        self.inner.count(collection).await
    }
}

struct Fixture {
    orchestrator: DeepDiveOrchestrator,
    source: Arc<StaticSource>,
    index: Arc<CountingIndex>,
    scorer: Arc<ScriptedScorer>,
}

async fn fixture(terms: Option<Vec<&str>>, corpus: &[(&str, &str)], top_k: usize) -> Fixture {
    let index = Arc::new(CountingIndex {
        inner: MemoryVectorIndex::new(),
        queries: AtomicUsize::new(0),
    });
    let schema = CollectionSchema::new("papers", DIM);
    index.ensure_collection(&schema).await.expect("collection");
    let records = corpus
        .iter()
        .map(|(id, text)| CorpusRecord {
            id: (*id).to_string(),
            vector: hashed_embedding(text, DIM),
            label: None,
        })
        .collect();
    index.insert_batch("papers", records).await.expect("insert");

    let collection = PaperCollection::new(
        index.clone(),
        EmbeddingProvider::new_hashed(DIM),
        schema,
    )
    .expect("collection");

    let mut papers: Vec<Paper> = corpus.iter().map(|(id, _)| paper(id)).collect();
    papers.push(paper("seed"));
    let source = Arc::new(StaticSource {
        papers,
        fetches: AtomicUsize::new(0),
    });

    let scorer = ScriptedScorer::with_relevance(&[("p1", 90), ("p2", 60), ("p3", 10)]).into_arc();
    let scoring = ScoringPipeline::new(
        scorer.clone(),
        ScoringConfig {
            concurrency: 2,
            research_interests: vec!["nearest neighbour search".to_string()],
        },
    );
    let extractor = Arc::new(ScriptedExtractor {
        terms: terms.map(|terms| terms.into_iter().map(str::to_string).collect()),
    });

    Fixture {
        orchestrator: DeepDiveOrchestrator::new(
            source.clone(),
            extractor,
            collection,
            scoring,
            DeepDiveConfig { top_k, n_terms: 5 },
        ),
        source,
        index,
        scorer,
    }
}

const CORPUS: &[(&str, &str)] = &[
    ("seed", "graph search"),
    ("p1", "graph search"),
    ("p2", "product quantization"),
    ("p3", "protein folding dynamics"),
];

#[tokio::test]
async fn extraction_failure_stops_before_expansion() {
    let fx = fixture(None, CORPUS, 2).await;

    let err = fx.orchestrator.run("seed").await.expect_err("should fail");

    assert!(matches!(err, AppError::Extraction(_)), "{err:?}");
    assert_eq!(fx.index.queries.load(Ordering::SeqCst), 0);
    // Only the seed lookup touched the source.
    assert_eq!(fx.source.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(fx.scorer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_seed_is_not_found() {
    let fx = fixture(Some(vec!["graph search"]), CORPUS, 2).await;
    let err = fx.orchestrator.run("missing").await.expect_err("unknown seed");
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(fx.index.queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn deep_dive_ranks_related_papers_without_the_seed() {
    let fx = fixture(
        Some(vec!["graph search", "product quantization"]),
        CORPUS,
        2,
    )
    .await;

    let report = fx.orchestrator.run("seed").await.expect("deep dive");

    assert_eq!(fx.index.queries.load(Ordering::SeqCst), 2);
    assert!(report.related.iter().all(|p| p.id != "seed"));
    let ids: Vec<&str> = report.related.iter().map(|p| p.id.as_str()).collect();
    assert!(ids.contains(&"p1") && ids.contains(&"p2"), "{ids:?}");
    assert!(report
        .related
        .windows(2)
        .all(|w| w[0].relevance_or_zero() >= w[1].relevance_or_zero()));
    assert_eq!(ids.first(), Some(&"p1"));

    assert_eq!(report.seed.summary.as_deref(), Some("Seed deep summary"));
    assert_eq!(report.seed.relevance, Some(93));
    assert_eq!(report.search_terms, vec!["graph search", "product quantization"]);
    assert!(!report.truncated);
    assert!(report.text.contains("# Title of seed"));
    assert!(report.text.contains("1. Title of p1 [p1] (relevance 90)"));
    assert!(report.text.contains("- product quantization"));
}

#[tokio::test]
async fn empty_candidate_set_still_renders() {
    let fx = fixture(Some(vec!["graph search"]), &[("seed", "graph search")], 3).await;

    let report = fx.orchestrator.run("seed").await.expect("deep dive");

    assert!(report.related.is_empty());
    assert_eq!(fx.scorer.calls.load(Ordering::SeqCst), 0);
    assert!(report.text.contains("(no related papers found)"));
}

#[tokio::test]
async fn cancelled_deep_dive_reports_truncation() {
    let fx = fixture(Some(vec!["graph search"]), CORPUS, 4).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = fx
        .orchestrator
        .run_until("seed", &cancel)
        .await
        .expect("deep dive");

    assert!(report.truncated);
    assert!(report.related.is_empty());
    assert!(report.text.contains("## Search terms"));
}
