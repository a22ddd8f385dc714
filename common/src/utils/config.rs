use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::{error::AppError, storage::vector_index::SearchMode};

#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    OpenAI,
    Hashed,
}

fn default_embedding_backend() -> EmbeddingBackendKind {
    EmbeddingBackendKind::OpenAI
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    /// Only needed by the `openai` embedding backend.
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default)]
    pub openrouter_api_key: Option<String>,
    #[serde(default = "default_openrouter_base_url")]
    pub openrouter_base_url: String,
    #[serde(default = "default_scoring_model")]
    pub scoring_model: String,

    #[serde(default = "default_embedding_backend")]
    pub embedding_backend: EmbeddingBackendKind,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: u32,

    pub surrealdb_address: String,
    #[serde(default = "default_surrealdb_credential")]
    pub surrealdb_username: String,
    #[serde(default = "default_surrealdb_credential")]
    pub surrealdb_password: String,
    #[serde(default = "default_surrealdb_scope")]
    pub surrealdb_namespace: String,
    #[serde(default = "default_surrealdb_scope")]
    pub surrealdb_database: String,

    #[serde(default = "default_collection_name")]
    pub collection_name: String,
    #[serde(default = "default_max_id_length")]
    pub max_id_length: usize,
    #[serde(default)]
    pub vector_search: SearchMode,
    #[serde(default = "default_corpus_vectors_path")]
    pub corpus_vectors_path: String,
    #[serde(default = "default_corpus_metadata_path")]
    pub corpus_metadata_path: String,
    #[serde(default = "default_ingest_chunk_size")]
    pub ingest_chunk_size: usize,

    #[serde(default = "default_scoring_concurrency")]
    pub scoring_concurrency: usize,
    #[serde(default = "default_deep_dive_top_k")]
    pub deep_dive_top_k: usize,
    #[serde(default = "default_deep_dive_terms")]
    pub deep_dive_terms: usize,
    #[serde(default = "default_relevance_cutoff")]
    pub relevance_cutoff: u8,
    #[serde(default)]
    pub research_interests: Vec<String>,
    #[serde(default = "default_papers_path")]
    pub papers_path: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_scoring_model() -> String {
    "gpt-4".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}

fn default_embedding_dimension() -> u32 {
    3072
}

fn default_surrealdb_credential() -> String {
    "root".to_string()
}

fn default_surrealdb_scope() -> String {
    "papers".to_string()
}

fn default_collection_name() -> String {
    "papers".to_string()
}

fn default_max_id_length() -> usize {
    25
}

fn default_corpus_vectors_path() -> String {
    "./data/vector_db/vectors.dat".to_string()
}

fn default_corpus_metadata_path() -> String {
    "./data/vector_db/papers.csv".to_string()
}

fn default_ingest_chunk_size() -> usize {
    1000
}

fn default_scoring_concurrency() -> usize {
    5
}

fn default_deep_dive_top_k() -> usize {
    10
}

fn default_deep_dive_terms() -> usize {
    5
}

fn default_relevance_cutoff() -> u8 {
    75
}

fn default_papers_path() -> String {
    "./data/papers.json".to_string()
}

impl AppConfig {
    /// Credentials for the scoring oracle, reported before any remote call is attempted.
    pub fn require_openrouter_key(&self) -> Result<&str, AppError> {
        self.openrouter_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AppError::Configuration("OPENROUTER_API_KEY is not set".into()))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.embedding_dimension == 0 {
            return Err(AppError::Configuration(
                "EMBEDDING_DIMENSION must be greater than zero".into(),
            ));
        }
        if self.ingest_chunk_size == 0 {
            return Err(AppError::Configuration(
                "INGEST_CHUNK_SIZE must be greater than zero".into(),
            ));
        }
        if self.deep_dive_top_k == 0 {
            return Err(AppError::Configuration(
                "DEEP_DIVE_TOP_K must be greater than zero".into(),
            ));
        }
        if self.relevance_cutoff > 100 {
            return Err(AppError::Configuration(
                "RELEVANCE_CUTOFF must be within 0..=100".into(),
            ));
        }
        Ok(())
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::default()
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("research_interests"),
        )
        .build()?;

    config.try_deserialize()
}
