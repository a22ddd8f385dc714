use common::utils::config::AppConfig;

#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Maximum number of oracle calls in flight.
    pub concurrency: usize,
    pub research_interests: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            research_interests: Vec::new(),
        }
    }
}

impl ScoringConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            concurrency: config.scoring_concurrency,
            research_interests: config.research_interests.clone(),
        }
    }
}
