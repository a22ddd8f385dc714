mod context;
mod report;
mod stages;
mod state;

pub use report::render_report;

use std::{sync::Arc, time::Instant};

use common::{
    error::AppError,
    storage::{collection::PaperCollection, types::paper::Paper},
    utils::config::AppConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use self::{
    context::DeepDiveContext,
    stages::{expand, extract, render, resolve, score, seed},
    state::ready,
};
use crate::{extraction::TermExtractor, pipeline::ScoringPipeline, sources::PaperSource};

#[derive(Debug, Clone)]
pub struct DeepDiveConfig {
    /// Neighbours requested from the index per search term.
    pub top_k: usize,
    /// Search terms requested from the extractor.
    pub n_terms: usize,
}

impl Default for DeepDiveConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            n_terms: 5,
        }
    }
}

impl DeepDiveConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            top_k: config.deep_dive_top_k,
            n_terms: config.deep_dive_terms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeepDiveReport {
    /// Seed with the summary and relevance reported by the extractor.
    pub seed: Paper,
    pub search_terms: Vec<String>,
    /// Scored related papers, highest relevance first.
    pub related: Vec<Paper>,
    /// Candidates whose scoring failed.
    pub failed: Vec<String>,
    pub truncated: bool,
    pub text: String,
}

/// Runs the seed → extract → expand → resolve → score → render pass for one paper.
pub struct DeepDiveOrchestrator {
    source: Arc<dyn PaperSource>,
    extractor: Arc<dyn TermExtractor>,
    collection: PaperCollection,
    scoring: ScoringPipeline,
    config: DeepDiveConfig,
}

impl DeepDiveOrchestrator {
    pub fn new(
        source: Arc<dyn PaperSource>,
        extractor: Arc<dyn TermExtractor>,
        collection: PaperCollection,
        scoring: ScoringPipeline,
        config: DeepDiveConfig,
    ) -> Self {
        Self {
            source,
            extractor,
            collection,
            scoring,
            config,
        }
    }

    pub async fn run(&self, seed_id: &str) -> Result<DeepDiveReport, AppError> {
        self.run_until(seed_id, &CancellationToken::new()).await
    }

    /// Cancellation only affects the scoring stage, which returns what finished.
    pub async fn run_until(
        &self,
        seed_id: &str,
        cancel: &CancellationToken,
    ) -> Result<DeepDiveReport, AppError> {
        let started = Instant::now();
        let mut ctx = DeepDiveContext::new(
            seed_id,
            self.source.as_ref(),
            self.extractor.as_ref(),
            &self.collection,
            &self.scoring,
            &self.config,
            cancel,
        );

        let machine = ready();
        let machine = seed(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let machine = extract(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let machine = expand(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let machine = resolve(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let machine = score(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let _machine = render(machine, &mut ctx).map_err(|err| ctx.abort(err))?;

        let outcome = ctx.take_outcome()?;
        let text = ctx.rendered.take().unwrap_or_default();
        let seed = ctx.seed.take().ok_or_else(|| {
            AppError::InternalError("seed paper expected after rendering".into())
        })?;

        info!(
            seed_id = %seed.id,
            related = outcome.papers.len(),
            failed = outcome.failed.len(),
            truncated = outcome.truncated,
            total_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "deep dive finished"
        );

        Ok(DeepDiveReport {
            seed,
            search_terms: std::mem::take(&mut ctx.search_terms),
            related: outcome.papers,
            failed: outcome.failed,
            truncated: outcome.truncated,
            text,
        })
    }
}

#[cfg(test)]
mod tests;
