use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Communication error: {0}")]
    Communication(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("LLM parsing error: {0}")]
    LLMParsing(String),
    #[error("Ingestion failed at chunk {chunk}: {reason}")]
    Ingestion { chunk: usize, reason: String },
    #[error("Term extraction failed: {0}")]
    Extraction(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Transport failures reaching an external service.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::OpenAI(_) | Self::Reqwest(_) | Self::Communication(_) | Self::Database(_)
        )
    }
}
