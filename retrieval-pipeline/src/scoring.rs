use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;
use common::{
    error::AppError,
    storage::types::paper::{Paper, MAX_RELEVANCE},
    utils::{config::AppConfig, llm::parse_json_possibly_fenced, prompts::PromptTemplates},
};
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Oracle verdict for one paper.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelevanceAssessment {
    pub summary: String,
    pub relevance: u8,
}

/// Scores a paper against the researcher's interests.
///
/// Transport failures are returned as errors. Malformed oracle output is not an
/// error; it yields a zero-relevance assessment with an empty summary.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score(
        &self,
        paper: &Paper,
        research_interests: &[String],
    ) -> Result<RelevanceAssessment, AppError>;
}

/// Reads a relevance score from a JSON number or numeric string, clamped to `0..=100`.
pub fn relevance_from_value(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(raw.round().clamp(0.0, f64::from(MAX_RELEVANCE)) as u8)
}

/// Interprets an oracle response, falling back to the zero assessment on any shape problem.
pub fn parse_assessment(content: &str) -> RelevanceAssessment {
    let value = match parse_json_possibly_fenced(content) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "Oracle response was not structured, scoring as 0");
            return RelevanceAssessment::default();
        }
    };

    let Some(relevance) = value.get("relevance").and_then(relevance_from_value) else {
        warn!("Oracle response lacked a usable relevance, scoring as 0");
        return RelevanceAssessment::default();
    };

    let summary = ["summary", "detailed_summary"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    RelevanceAssessment { summary, relevance }
}

/// Chat-completion backed scorer for any OpenAI-compatible endpoint.
pub struct LlmRelevanceScorer {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    prompts: Arc<PromptTemplates>,
}

impl LlmRelevanceScorer {
    pub fn new(
        client: Arc<Client<OpenAIConfig>>,
        model: impl Into<String>,
        prompts: Arc<PromptTemplates>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            prompts,
        }
    }

    /// Targets the configured OpenRouter endpoint; a missing key is a configuration error.
    pub fn from_config(config: &AppConfig, prompts: Arc<PromptTemplates>) -> Result<Self, AppError> {
        let api_key = config.require_openrouter_key()?;
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(&config.openrouter_base_url),
        );
        Ok(Self::new(
            Arc::new(client),
            config.scoring_model.clone(),
            prompts,
        ))
    }
}

#[async_trait]
impl RelevanceScorer for LlmRelevanceScorer {
    #[instrument(skip_all, fields(paper_id = %paper.id, model = %self.model))]
    async fn score(
        &self,
        paper: &Paper,
        research_interests: &[String],
    ) -> Result<RelevanceAssessment, AppError> {
        let prompt = self.prompts.render_relevance_scoring(
            research_interests,
            &paper.title,
            &paper.abstract_text,
            &paper.full_text_link,
        )?;
        debug!(prompt_chars = prompt.len(), "Calling scoring model");

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([ChatCompletionRequestUserMessage::from(prompt).into()])
            .build()?;

        let response = self.client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .unwrap_or_default();

        Ok(parse_assessment(content))
    }
}
