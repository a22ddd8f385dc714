use minijinja::{context, Environment};

use crate::error::AppError;

pub const RELEVANCE_SCORING_TEMPLATE: &str = "relevance_scoring";
pub const DEEP_DIVE_TEMPLATE: &str = "deep_dive";

pub static DEFAULT_RELEVANCE_SCORING_PROMPT: &str = r#"You are a research assistant screening new papers for a single researcher.

The researcher is interested in:
{% for topic in topics %}  - {{ topic }}
{% endfor %}
Paper title: {{ title }}
Abstract:
{{ abstract_text }}
Full text: {{ full_text_link }}

Rate how relevant this paper is to the interests above on an integer scale from 0 (unrelated) to 100 (essential reading), and write a two to three sentence summary aimed at this researcher.

Respond with JSON only:
{"relevance": <integer 0-100>, "summary": "<summary>"}"#;

pub static DEFAULT_DEEP_DIVE_PROMPT: &str = r#"You are a research assistant preparing a deep dive on the attached paper.

The researcher is interested in:
{% for topic in topics %}  - {{ topic }}
{% endfor %}
Read the full paper and respond with JSON only, using this shape:
{"relevance": <integer 0-100>, "detailed_summary": "<one paragraph>", "search_terms": [<exactly {{ n_terms }} short search phrases for finding closely related work>]}"#;

/// Prompt templates rendered with minijinja. Templates are compiled once at construction.
pub struct PromptTemplates {
    env: Environment<'static>,
}

impl PromptTemplates {
    pub fn new() -> Result<Self, AppError> {
        Self::with_sources(DEFAULT_RELEVANCE_SCORING_PROMPT, DEFAULT_DEEP_DIVE_PROMPT)
    }

    pub fn with_sources(scoring: &'static str, deep_dive: &'static str) -> Result<Self, AppError> {
        let mut env = Environment::new();
        env.add_template(RELEVANCE_SCORING_TEMPLATE, scoring)
            .map_err(|e| AppError::Configuration(format!("invalid scoring prompt: {e}")))?;
        env.add_template(DEEP_DIVE_TEMPLATE, deep_dive)
            .map_err(|e| AppError::Configuration(format!("invalid deep dive prompt: {e}")))?;
        Ok(Self { env })
    }

    pub fn render_relevance_scoring(
        &self,
        topics: &[String],
        title: &str,
        abstract_text: &str,
        full_text_link: &str,
    ) -> Result<String, AppError> {
        let template = self.env.get_template(RELEVANCE_SCORING_TEMPLATE)?;
        Ok(template.render(context! {
            topics => topics,
            title => title,
            abstract_text => abstract_text,
            full_text_link => full_text_link,
        })?)
    }

    pub fn render_deep_dive(&self, topics: &[String], n_terms: usize) -> Result<String, AppError> {
        let template = self.env.get_template(DEEP_DIVE_TEMPLATE)?;
        Ok(template.render(context! {
            topics => topics,
            n_terms => n_terms,
        })?)
    }
}
