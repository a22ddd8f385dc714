use std::sync::Arc;

use tracing::{debug, instrument};

use crate::{
    error::AppError,
    storage::vector_index::{CollectionSchema, VectorHit, VectorIndex},
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};

/// A vector collection paired with the embedding provider used to query it by text.
#[derive(Clone)]
pub struct PaperCollection {
    index: Arc<dyn VectorIndex>,
    embedder: EmbeddingProvider,
    schema: CollectionSchema,
}

impl PaperCollection {
    /// Fails with a configuration error when the provider's dimension differs from the schema.
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: EmbeddingProvider,
        schema: CollectionSchema,
    ) -> Result<Self, AppError> {
        schema.validate()?;
        if embedder.dimension() != schema.dimension {
            return Err(AppError::Configuration(format!(
                "embedding backend '{}' produces {} dimensions but collection '{}' declares {}",
                embedder.backend_label(),
                embedder.dimension(),
                schema.name,
                schema.dimension
            )));
        }
        Ok(Self {
            index,
            embedder,
            schema,
        })
    }

    pub fn schema_from_config(config: &AppConfig) -> CollectionSchema {
        CollectionSchema::new(
            config.collection_name.clone(),
            config.embedding_dimension as usize,
        )
        .with_max_id_length(config.max_id_length)
    }

    pub async fn ensure(&self) -> Result<(), AppError> {
        self.index.ensure_collection(&self.schema).await
    }

    /// Nearest records for a precomputed vector.
    async fn query_vector(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorHit>, AppError> {
        self.index.query(&self.schema.name, vector, top_k).await
    }

    /// Embeds `text` and returns the ids of its nearest records.
    #[instrument(skip_all, fields(collection = %self.schema.name, top_k = top_k))]
    pub async fn query_text(&self, text: &str, top_k: usize) -> Result<Vec<String>, AppError> {
        if top_k == 0 {
            return Err(AppError::Validation("top_k must be positive".into()));
        }
        let vector = self.embedder.embed(text).await?;
        let hits = self.query_vector(&vector, top_k).await?;
        debug!(hits = hits.len(), "Similarity query finished");
        Ok(hits.into_iter().map(|hit| hit.id).collect())
    }
}
