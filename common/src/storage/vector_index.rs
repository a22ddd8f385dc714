use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::{error::AppError, storage::db::SurrealDbClient};

/// Registry table holding one schema record per collection.
pub const COLLECTION_REGISTRY_TABLE: &str = "vector_collection";
const RESERVED_TABLES: [&str; 2] = [COLLECTION_REGISTRY_TABLE, "run_state"];
const HNSW_EF: usize = 40;
/// The HNSW pass fetches this many candidates per requested hit.
const HNSW_OVERFETCH: usize = 4;
/// Distances closer than this are treated as equal when deciding the top-k boundary.
const TIE_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
}

impl DistanceMetric {
    fn surreal_keyword(self) -> &'static str {
        match self {
            Self::Cosine => "COSINE",
        }
    }

    /// Distance under this metric; smaller is closer.
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_distance(a, b),
        }
    }
}

/// How `SurrealVectorIndex` answers similarity queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Approximate search through the collection's HNSW index.
    #[default]
    Hnsw,
    /// Brute-force scan computing the metric for every record.
    Exact,
}

/// Declared shape of a collection. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: String,
    pub dimension: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
    pub max_id_length: usize,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric: DistanceMetric::Cosine,
            max_id_length: 25,
        }
    }

    #[must_use]
    pub fn with_max_id_length(mut self, max_id_length: usize) -> Self {
        self.max_id_length = max_id_length;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        validate_collection_name(&self.name)?;
        if self.dimension == 0 {
            return Err(AppError::Configuration(format!(
                "collection '{}' must declare a positive dimension",
                self.name
            )));
        }
        if self.max_id_length == 0 {
            return Err(AppError::Configuration(format!(
                "collection '{}' must allow ids of at least one character",
                self.name
            )));
        }
        Ok(())
    }

    /// An existing collection satisfies `requested` when dimension and metric agree.
    fn ensure_compatible(&self, requested: &CollectionSchema) -> Result<(), AppError> {
        if self.dimension != requested.dimension {
            return Err(AppError::Configuration(format!(
                "collection '{}' has dimension {}, requested {}",
                self.name, self.dimension, requested.dimension
            )));
        }
        if self.metric != requested.metric {
            return Err(AppError::Configuration(format!(
                "collection '{}' uses metric {:?}, requested {:?}",
                self.name, self.metric, requested.metric
            )));
        }
        Ok(())
    }

    fn check_query_vector(&self, vector: &[f32], top_k: usize) -> Result<(), AppError> {
        if top_k == 0 {
            return Err(AppError::Validation("top_k must be positive".into()));
        }
        if vector.len() != self.dimension {
            return Err(AppError::Configuration(format!(
                "query vector has dimension {}, collection '{}' expects {}",
                vector.len(),
                self.name,
                self.dimension
            )));
        }
        Ok(())
    }

    /// Rejects malformed records and duplicate ids inside one batch.
    fn check_batch(&self, records: &[CorpusRecord]) -> Result<(), AppError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            if record.id.is_empty() {
                return Err(AppError::Validation("record id must not be empty".into()));
            }
            if record.id.len() > self.max_id_length {
                return Err(AppError::Validation(format!(
                    "record id '{}' exceeds {} characters",
                    record.id, self.max_id_length
                )));
            }
            if record.vector.len() != self.dimension {
                return Err(AppError::Validation(format!(
                    "record '{}' has dimension {}, expected {}",
                    record.id,
                    record.vector.len(),
                    self.dimension
                )));
            }
            if record.vector.iter().any(|value| !value.is_finite()) {
                return Err(AppError::Validation(format!(
                    "record '{}' contains non-finite values",
                    record.id
                )));
            }
            if !seen.insert(record.id.as_str()) {
                return Err(AppError::Validation(format!(
                    "duplicate record id '{}' in batch",
                    record.id
                )));
            }
        }
        Ok(())
    }
}

/// One corpus entry: external id, embedding and an optional source label.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub distance: f32,
    #[serde(default)]
    pub label: Option<String>,
}

/// A named similarity index over corpus records.
///
/// Inserting an id that is already present fails the whole batch; records are
/// only ever removed by dropping the collection.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the collection unless it already exists with a compatible schema.
    async fn ensure_collection(&self, schema: &CollectionSchema) -> Result<(), AppError>;

    /// Drops the collection and its records. Returns whether it existed.
    async fn drop_collection(&self, name: &str) -> Result<bool, AppError>;

    async fn describe(&self, name: &str) -> Result<Option<CollectionSchema>, AppError>;

    /// Inserts all records or none of them.
    async fn insert_batch(
        &self,
        collection: &str,
        records: Vec<CorpusRecord>,
    ) -> Result<usize, AppError>;

    /// Up to `top_k` hits ordered by ascending distance, ties broken by id.
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorHit>, AppError>;

    async fn count(&self, collection: &str) -> Result<usize, AppError>;
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Ascending distance, then ascending id.
pub fn sort_hits(hits: &mut [VectorHit]) {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn validate_collection_name(name: &str) -> Result<(), AppError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest {
        return Err(AppError::Configuration(format!(
            "invalid collection name '{name}'"
        )));
    }
    if RESERVED_TABLES.contains(&name) {
        return Err(AppError::Configuration(format!(
            "collection name '{name}' is reserved"
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct StoredVector {
    id: String,
    embedding: Vec<f32>,
    label: Option<String>,
}

#[derive(Deserialize)]
struct CountRow {
    count: usize,
}

/// SurrealDB-backed index: one table per collection with an HNSW index on `embedding`.
#[derive(Clone)]
pub struct SurrealVectorIndex {
    db: Arc<SurrealDbClient>,
    mode: SearchMode,
}

impl SurrealVectorIndex {
    pub fn new(db: Arc<SurrealDbClient>, mode: SearchMode) -> Self {
        Self { db, mode }
    }

    async fn select_hits(
        &self,
        query: String,
        vector: &[f32],
    ) -> Result<Vec<VectorHit>, AppError> {
        let mut hits: Vec<VectorHit> = self
            .db
            .client
            .query(query)
            .bind(("vector", vector.to_vec()))
            .await?
            .take(0)?;
        sort_hits(&mut hits);
        Ok(hits)
    }

    async fn exact_hits(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorHit>, AppError> {
        let query = format!(
            "SELECT meta::id(id) AS id, label, \
             1 - vector::similarity::cosine(embedding, $vector) AS distance \
             FROM {collection} ORDER BY distance ASC, id ASC LIMIT {top_k}"
        );
        self.select_hits(query, vector).await
    }

    /// Approximate search through the HNSW index.
    ///
    /// The index decides which of several equidistant records it returns, so the
    /// pass over-fetches. When the candidates tied with the k-th hit may extend past
    /// what was fetched, the query is answered by an exact scan instead.
    async fn hnsw_hits(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorHit>, AppError> {
        let fetch = top_k.saturating_mul(HNSW_OVERFETCH);
        let query = format!(
            "SELECT meta::id(id) AS id, label, vector::distance::knn() AS distance \
             FROM {collection} WHERE embedding <|{fetch},{ef}|> $vector ORDER BY distance",
            ef = HNSW_EF.max(fetch),
        );
        let hits = self.select_hits(query, vector).await?;

        let boundary = top_k
            .checked_sub(1)
            .and_then(|last| hits.get(last))
            .map(|hit| hit.distance);
        let tie_may_be_cut = match (boundary, hits.last()) {
            (Some(kth), Some(furthest)) => {
                hits.len() >= fetch && furthest.distance <= kth + TIE_EPSILON
            }
            _ => false,
        };

        if tie_may_be_cut {
            debug!(top_k, fetch, "Tie at the top-k boundary, falling back to exact scan");
            return self.exact_hits(collection, vector, top_k).await;
        }
        Ok(hits)
    }

    async fn require(&self, name: &str) -> Result<CollectionSchema, AppError> {
        self.describe(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("collection '{name}' does not exist")))
    }

    fn hnsw_definition(schema: &CollectionSchema) -> String {
        format!(
            "DEFINE INDEX IF NOT EXISTS idx_{table}_embedding ON TABLE {table} \
             FIELDS embedding HNSW DIMENSION {dimension} DIST {metric} TYPE F32 EFC 100 M 8;",
            table = schema.name,
            dimension = schema.dimension,
            metric = schema.metric.surreal_keyword(),
        )
    }
}

#[async_trait]
impl VectorIndex for SurrealVectorIndex {
    #[instrument(skip_all, fields(collection = %schema.name))]
    async fn ensure_collection(&self, schema: &CollectionSchema) -> Result<(), AppError> {
        schema.validate()?;

        if let Some(existing) = self.describe(&schema.name).await? {
            existing.ensure_compatible(schema)?;
            debug!("Using existing collection");
            return Ok(());
        }

        let query = format!(
            "BEGIN TRANSACTION;
             CREATE type::thing('{COLLECTION_REGISTRY_TABLE}', $name) CONTENT $schema;
             DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS;
             {index}
             COMMIT TRANSACTION;",
            table = schema.name,
            index = Self::hnsw_definition(schema),
        );

        let res = self
            .db
            .client
            .query(query)
            .bind(("name", schema.name.clone()))
            .bind(("schema", schema.clone()))
            .await?;
        res.check()?;

        info!(dimension = schema.dimension, "Created new collection");
        Ok(())
    }

    #[instrument(skip_all, fields(collection = %name))]
    async fn drop_collection(&self, name: &str) -> Result<bool, AppError> {
        validate_collection_name(name)?;
        let existed = self.describe(name).await?.is_some();

        let res = self
            .db
            .client
            .query(format!(
                "BEGIN TRANSACTION;
                 REMOVE TABLE IF EXISTS {name};
                 DELETE type::thing('{COLLECTION_REGISTRY_TABLE}', $name);
                 COMMIT TRANSACTION;"
            ))
            .bind(("name", name.to_owned()))
            .await?;
        res.check()?;

        if existed {
            info!("Dropped existing collection");
        }
        Ok(existed)
    }

    async fn describe(&self, name: &str) -> Result<Option<CollectionSchema>, AppError> {
        validate_collection_name(name)?;
        let schema: Option<CollectionSchema> = self
            .db
            .client
            .query(format!(
                "SELECT name, dimension, metric, max_id_length \
                 FROM type::thing('{COLLECTION_REGISTRY_TABLE}', $name)"
            ))
            .bind(("name", name.to_owned()))
            .await?
            .take(0)?;

        Ok(schema)
    }

    async fn insert_batch(
        &self,
        collection: &str,
        records: Vec<CorpusRecord>,
    ) -> Result<usize, AppError> {
        let schema = self.require(collection).await?;
        schema.check_batch(&records)?;
        if records.is_empty() {
            return Ok(0);
        }

        let inserted = records.len();
        let rows: Vec<StoredVector> = records
            .into_iter()
            .map(|record| StoredVector {
                id: record.id,
                embedding: record.vector,
                label: record.label,
            })
            .collect();

        let res = self
            .db
            .client
            .query(format!(
                "BEGIN TRANSACTION;
                 INSERT INTO {collection} $rows;
                 COMMIT TRANSACTION;"
            ))
            .bind(("rows", rows))
            .await?;
        res.check()?;

        Ok(inserted)
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorHit>, AppError> {
        let schema = self.require(collection).await?;
        schema.check_query_vector(vector, top_k)?;

        let mut hits = match self.mode {
            SearchMode::Hnsw => self.hnsw_hits(collection, vector, top_k).await?,
            SearchMode::Exact => self.exact_hits(collection, vector, top_k).await?,
        };

        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<usize, AppError> {
        self.require(collection).await?;
        let row: Option<CountRow> = self
            .db
            .client
            .query(format!("SELECT count() FROM {collection} GROUP ALL"))
            .await?
            .take(0)?;

        Ok(row.map_or(0, |row| row.count))
    }
}

struct MemoryCollection {
    schema: CollectionSchema,
    records: BTreeMap<String, (Vec<f32>, Option<String>)>,
}

/// Exact in-process index. Readers share the lock; a batch insert holds it exclusively.
#[derive(Default)]
pub struct MemoryVectorIndex {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_collection(&self, schema: &CollectionSchema) -> Result<(), AppError> {
        schema.validate()?;
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(&schema.name) {
            return existing.schema.ensure_compatible(schema);
        }
        collections.insert(
            schema.name.clone(),
            MemoryCollection {
                schema: schema.clone(),
                records: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<bool, AppError> {
        Ok(self.collections.write().await.remove(name).is_some())
    }

    async fn describe(&self, name: &str) -> Result<Option<CollectionSchema>, AppError> {
        Ok(self
            .collections
            .read()
            .await
            .get(name)
            .map(|collection| collection.schema.clone()))
    }

    async fn insert_batch(
        &self,
        collection: &str,
        records: Vec<CorpusRecord>,
    ) -> Result<usize, AppError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| {
                AppError::NotFound(format!("collection '{collection}' does not exist"))
            })?;

        target.schema.check_batch(&records)?;
        if let Some(existing) = records
            .iter()
            .find(|record| target.records.contains_key(&record.id))
        {
            return Err(AppError::Validation(format!(
                "record id '{}' already exists in '{collection}'",
                existing.id
            )));
        }

        let inserted = records.len();
        for record in records {
            target
                .records
                .insert(record.id, (record.vector, record.label));
        }
        Ok(inserted)
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorHit>, AppError> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| {
                AppError::NotFound(format!("collection '{collection}' does not exist"))
            })?;
        target.schema.check_query_vector(vector, top_k)?;

        let metric = target.schema.metric;
        let mut hits: Vec<VectorHit> = target
            .records
            .iter()
            .map(|(id, (stored, label))| VectorHit {
                id: id.clone(),
                distance: metric.distance(vector, stored),
                label: label.clone(),
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<usize, AppError> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|target| target.records.len())
            .ok_or_else(|| {
                AppError::NotFound(format!("collection '{collection}' does not exist"))
            })
    }
}
