use common::utils::config::AppConfig;

#[derive(Debug, Clone)]
pub struct IngestionTuning {
    /// Rows per `insert_batch` call.
    pub chunk_size: usize,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        Self { chunk_size: 1_000 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
    /// Drop the collection before loading.
    pub recreate: bool,
}

impl IngestionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: IngestionTuning {
                chunk_size: config.ingest_chunk_size,
            },
            recreate: false,
        }
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.tuning.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn with_recreate(mut self, recreate: bool) -> Self {
        self.recreate = recreate;
        self
    }
}
