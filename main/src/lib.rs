#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

use std::sync::Arc;

use common::{
    error::AppError,
    storage::{
        collection::PaperCollection,
        db::SurrealDbClient,
        vector_index::{SurrealVectorIndex, VectorIndex},
    },
    utils::{
        config::{get_config, AppConfig},
        embedding::EmbeddingProvider,
        prompts::PromptTemplates,
    },
};
use retrieval_pipeline::{LlmRelevanceScorer, ScoringConfig, ScoringPipeline};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logs go to stderr so reports on stdout stay clean.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

pub fn load_config() -> Result<AppConfig, AppError> {
    let config = get_config().map_err(|err| AppError::Configuration(err.to_string()))?;
    config.validate()?;
    Ok(config)
}

pub async fn connect_db(config: &AppConfig) -> Result<Arc<SurrealDbClient>, AppError> {
    let db = SurrealDbClient::new(
        &config.surrealdb_address,
        &config.surrealdb_username,
        &config.surrealdb_password,
        &config.surrealdb_namespace,
        &config.surrealdb_database,
    )
    .await?;
    db.ensure_initialized().await?;
    info!(address = %config.surrealdb_address, "Database ready");
    Ok(Arc::new(db))
}

pub fn vector_index(db: Arc<SurrealDbClient>, config: &AppConfig) -> Arc<dyn VectorIndex> {
    Arc::new(SurrealVectorIndex::new(db, config.vector_search))
}

pub fn paper_collection(
    config: &AppConfig,
    index: Arc<dyn VectorIndex>,
) -> Result<PaperCollection, AppError> {
    let embedder = EmbeddingProvider::from_config(config)?;
    info!(
        embedding_backend = embedder.backend_label(),
        embedding_dimension = embedder.dimension(),
        "Embedding provider initialized"
    );
    PaperCollection::new(index, embedder, PaperCollection::schema_from_config(config))
}

pub fn scoring_pipeline(
    config: &AppConfig,
    prompts: Arc<PromptTemplates>,
) -> Result<ScoringPipeline, AppError> {
    let scorer = LlmRelevanceScorer::from_config(config, prompts)?;
    Ok(ScoringPipeline::new(
        Arc::new(scorer),
        ScoringConfig::from_app_config(config),
    ))
}

/// A token that fires on the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight work");
            trigger.cancel();
        }
    });
    token
}
