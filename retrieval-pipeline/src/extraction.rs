use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::types::paper::Paper,
    utils::{config::AppConfig, llm::parse_json_possibly_fenced, prompts::PromptTemplates},
};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::scoring::relevance_from_value;

/// What the oracle learned about a seed paper from its full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedAnalysis {
    pub detailed_summary: String,
    pub relevance: Option<u8>,
    pub search_terms: Vec<String>,
}

/// Derives search phrases for a seed paper.
///
/// Every failure is reported as [`AppError::Extraction`]; a deep dive cannot
/// continue without terms.
#[async_trait]
pub trait TermExtractor: Send + Sync {
    async fn extract(
        &self,
        paper: &Paper,
        research_interests: &[String],
        n_terms: usize,
    ) -> Result<SeedAnalysis, AppError>;
}

/// Trims, de-duplicates and truncates raw search terms, keeping first occurrences.
pub fn normalize_terms<I, S>(raw: I, n_terms: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|term| {
            let term = term.as_ref().trim();
            (!term.is_empty() && seen.insert(term.to_lowercase())).then(|| term.to_string())
        })
        .take(n_terms)
        .collect()
}

pub fn parse_seed_analysis(content: &str, n_terms: usize) -> Result<SeedAnalysis, AppError> {
    let value = parse_json_possibly_fenced(content)
        .map_err(|err| AppError::Extraction(format!("unstructured oracle response: {err}")))?;

    let search_terms = match value.get("search_terms") {
        Some(Value::Array(items)) => normalize_terms(items.iter().filter_map(Value::as_str), n_terms),
        _ => Vec::new(),
    };
    if search_terms.is_empty() {
        return Err(AppError::Extraction(
            "oracle response contained no search terms".to_string(),
        ));
    }

    Ok(SeedAnalysis {
        detailed_summary: value
            .get("detailed_summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        relevance: value.get("relevance").and_then(relevance_from_value),
        search_terms,
    })
}

/// Extracts terms through OpenRouter, which reads the seed's PDF with its file parser plugin.
pub struct OpenRouterTermExtractor {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    prompts: Arc<PromptTemplates>,
}

impl OpenRouterTermExtractor {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        prompts: Arc<PromptTemplates>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            prompts,
        }
    }

    pub fn from_config(config: &AppConfig, prompts: Arc<PromptTemplates>) -> Result<Self, AppError> {
        let api_key = config.require_openrouter_key()?;
        Ok(Self::new(
            reqwest::Client::new(),
            &config.openrouter_base_url,
            api_key,
            &config.scoring_model,
            prompts,
        ))
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn payload(&self, prompt: &str, paper: &Paper) -> Value {
        json!({
            "model": self.model,
            "plugins": [{ "id": "file-parser", "pdf": { "engine": "pdf-text" } }],
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    {
                        "type": "file",
                        "file": { "filename": "document.pdf", "file_data": paper.full_text_link }
                    }
                ]
            }]
        })
    }

    async fn request(&self, payload: &Value) -> Result<String, AppError> {
        let body: Value = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::LLMParsing("response had no message content".to_string()))
    }
}

#[async_trait]
impl TermExtractor for OpenRouterTermExtractor {
    #[instrument(skip_all, fields(paper_id = %paper.id, n_terms = n_terms))]
    async fn extract(
        &self,
        paper: &Paper,
        research_interests: &[String],
        n_terms: usize,
    ) -> Result<SeedAnalysis, AppError> {
        let prompt = self.prompts.render_deep_dive(research_interests, n_terms)?;
        let payload = self.payload(&prompt, paper);

        let content = self
            .request(&payload)
            .await
            .map_err(|err| AppError::Extraction(err.to_string()))?;
        debug!(chars = content.len(), "Received seed analysis");

        parse_seed_analysis(&content, n_terms)
    }
}
