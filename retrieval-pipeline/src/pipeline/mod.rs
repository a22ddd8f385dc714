mod config;

pub use config::ScoringConfig;

use std::sync::Arc;

use common::{error::AppError, storage::types::paper::Paper};
use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::scoring::RelevanceScorer;

/// Result of one scoring run.
#[derive(Debug, Default)]
pub struct ScoringOutcome {
    /// Scored papers, highest relevance first, ties by ascending id.
    pub papers: Vec<Paper>,
    /// Ids whose scoring call failed. These papers are not in `papers`.
    pub failed: Vec<String>,
    /// Set when cancellation stopped dispatch before every paper was attempted.
    pub truncated: bool,
}

/// Highest relevance first, then ascending id.
pub fn sort_by_relevance(papers: &mut [Paper]) {
    papers.sort_by(|a, b| {
        b.relevance_or_zero()
            .cmp(&a.relevance_or_zero())
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Fans a batch of papers out to a [`RelevanceScorer`] with bounded parallelism.
///
/// Each paper is scored exactly once. A paper whose scorer call fails is logged
/// and left out of the output; the rest of the batch is unaffected.
#[derive(Clone)]
pub struct ScoringPipeline {
    scorer: Arc<dyn RelevanceScorer>,
    config: ScoringConfig,
}

impl ScoringPipeline {
    pub fn new(scorer: Arc<dyn RelevanceScorer>, config: ScoringConfig) -> Self {
        Self { scorer, config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Scores every paper and returns the survivors in ranked order.
    pub async fn run(&self, papers: Vec<Paper>) -> Vec<Paper> {
        self.run_until(papers, &CancellationToken::new()).await.papers
    }

    /// Like [`Self::run`], but stops dispatching new papers once `cancel` fires.
    /// Calls already in flight are allowed to finish.
    #[instrument(skip_all, fields(papers = papers.len(), concurrency = self.config.concurrency))]
    pub async fn run_until(&self, papers: Vec<Paper>, cancel: &CancellationToken) -> ScoringOutcome {
        let total = papers.len();
        let concurrency = self.config.concurrency.max(1);
        let scorer = self.scorer.as_ref();
        let interests = self.config.research_interests.as_slice();

        let results: Vec<(String, Result<Paper, AppError>)> = stream::iter(papers)
            .take_until(cancel.cancelled())
            .map(|paper| async move {
                let id = paper.id.clone();
                let scored = scorer
                    .score(&paper, interests)
                    .await
                    .map(|assessment| paper.scored(assessment.summary, assessment.relevance));
                (id, scored)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let attempted = results.len();
        let mut outcome = ScoringOutcome {
            truncated: attempted < total,
            ..ScoringOutcome::default()
        };
        for (id, result) in results {
            match result {
                Ok(paper) => outcome.papers.push(paper),
                Err(err) => {
                    warn!(paper_id = %id, error = %err, "Paper scoring failed, dropping it");
                    outcome.failed.push(id);
                }
            }
        }

        sort_by_relevance(&mut outcome.papers);
        outcome.failed.sort_unstable();

        info!(
            scored = outcome.papers.len(),
            failed = outcome.failed.len(),
            skipped = total - attempted,
            "Scoring finished"
        );
        outcome
    }
}
