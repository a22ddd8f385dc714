use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
};

use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use tracing::debug;

use crate::{
    error::AppError,
    utils::config::{AppConfig, EmbeddingBackendKind},
};

#[derive(Clone)]
pub struct EmbeddingProvider {
    inner: EmbeddingInner,
}

#[derive(Clone)]
enum EmbeddingInner {
    OpenAI {
        client: Arc<Client<OpenAIConfig>>,
        model: String,
        dimensions: u32,
    },
    Hashed {
        dimension: usize,
    },
}

impl EmbeddingProvider {
    pub fn backend_label(&self) -> &'static str {
        match self.inner {
            EmbeddingInner::Hashed { .. } => "hashed",
            EmbeddingInner::OpenAI { .. } => "openai",
        }
    }

    pub fn dimension(&self) -> usize {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => *dimension,
            EmbeddingInner::OpenAI { dimensions, .. } => *dimensions as usize,
        }
    }

    /// Embeds a single non-empty text. Provider failures are returned as-is; callers own retries.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::Validation("cannot embed empty text".to_string()));
        }

        let embedding = match &self.inner {
            EmbeddingInner::Hashed { dimension } => hashed_embedding(text, *dimension),
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input([text])
                    .dimensions(*dimensions)
                    .build()?;

                let response = client.embeddings().create(request).await?;

                response
                    .data
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        AppError::Communication("No embedding data received from API".into())
                    })?
                    .embedding
            }
        };

        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    /// Embeds a batch, preserving input order.
    pub async fn embed_many(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AppError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(AppError::Validation("cannot embed empty text".to_string()));
        }

        let embeddings: Vec<Vec<f32>> = match &self.inner {
            EmbeddingInner::Hashed { dimension } => texts
                .iter()
                .map(|text| hashed_embedding(text, *dimension))
                .collect(),
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => {
                let expected = texts.len();
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input(texts)
                    .dimensions(*dimensions)
                    .build()?;

                let response = client.embeddings().create(request).await?;

                let mut data = response.data;
                data.sort_by_key(|item| item.index);
                if data.len() != expected {
                    return Err(AppError::Communication(format!(
                        "embedding API returned {} vectors for {expected} inputs",
                        data.len()
                    )));
                }
                data.into_iter().map(|item| item.embedding).collect()
            }
        };

        for embedding in &embeddings {
            self.check_dimension(embedding)?;
        }
        debug!(count = embeddings.len(), "Embedded batch");
        Ok(embeddings)
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), AppError> {
        if embedding.len() == self.dimension() {
            Ok(())
        } else {
            Err(AppError::Configuration(format!(
                "embedding has dimension {}, expected {}",
                embedding.len(),
                self.dimension()
            )))
        }
    }

    pub fn new_openai(client: Arc<Client<OpenAIConfig>>, model: String, dimensions: u32) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            },
        }
    }

    pub fn new_hashed(dimension: usize) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::Hashed {
                dimension: dimension.max(1),
            },
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        match config.embedding_backend {
            EmbeddingBackendKind::Hashed => {
                Ok(Self::new_hashed(config.embedding_dimension as usize))
            }
            EmbeddingBackendKind::OpenAI => {
                let api_key = config
                    .openai_api_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| {
                        AppError::Configuration(
                            "OPENAI_API_KEY is required for the openai embedding backend".into(),
                        )
                    })?;
                let client = Client::with_config(
                    OpenAIConfig::new()
                        .with_api_key(api_key)
                        .with_api_base(&config.openai_base_url),
                );
                Ok(Self::new_openai(
                    Arc::new(client),
                    config.embedding_model.clone(),
                    config.embedding_dimension,
                ))
            }
        }
    }
}

/// Deterministic bag-of-words embedding for offline runs and tests.
pub fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let dim = dimension.max(1);
    let mut vector = vec![0.0f32; dim];

    for token in tokens(text) {
        if let Some(slot) = vector.get_mut(bucket(&token, dim)) {
            *slot += 1.0;
        }
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension
}
