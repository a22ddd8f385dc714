use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{paper::Paper, run_state::RunState},
    },
    utils::config::AppConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::{pipeline::ScoringPipeline, sources::PaperSource};

#[derive(Debug, Clone)]
pub struct DigestReport {
    /// Papers published before this instant were skipped.
    pub since: DateTime<Utc>,
    /// Papers at or above the cutoff, highest relevance first.
    pub papers: Vec<Paper>,
    pub scored: usize,
    pub failed: Vec<String>,
    pub failed_sources: Vec<String>,
}

/// Recurring search: score what is new since the last run and keep the relevant part.
pub struct Digest {
    sources: Vec<Arc<dyn PaperSource>>,
    scoring: ScoringPipeline,
    db: Arc<SurrealDbClient>,
    relevance_cutoff: u8,
}

impl Digest {
    pub fn new(
        sources: Vec<Arc<dyn PaperSource>>,
        scoring: ScoringPipeline,
        db: Arc<SurrealDbClient>,
        relevance_cutoff: u8,
    ) -> Self {
        Self {
            sources,
            scoring,
            db,
            relevance_cutoff,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        sources: Vec<Arc<dyn PaperSource>>,
        scoring: ScoringPipeline,
        db: Arc<SurrealDbClient>,
    ) -> Self {
        Self::new(sources, scoring, db, config.relevance_cutoff)
    }

    /// Fetches from every source, scores the new papers and records `now` as the last run.
    ///
    /// A source that fails to fetch is skipped. The run is only recorded when at
    /// least one source succeeded, so a full outage does not move the window.
    #[instrument(skip_all, fields(sources = self.sources.len(), cutoff = self.relevance_cutoff))]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<DigestReport, AppError> {
        let since = RunState::last_run_or_default(&self.db, now).await?;

        let mut fresh = Vec::new();
        let mut failed_sources = Vec::new();
        for source in &self.sources {
            match source.fetch_papers().await {
                Ok(papers) => {
                    let fetched = papers.len();
                    fresh.extend(papers.into_iter().filter(|p| p.is_published_since(since)));
                    info!(source = source.name(), fetched, "Fetched papers");
                }
                Err(err) => {
                    warn!(source = source.name(), error = %err, "Paper source failed, skipping");
                    failed_sources.push(source.name().to_string());
                }
            }
        }

        if !self.sources.is_empty() && failed_sources.len() == self.sources.len() {
            return Err(AppError::Communication(format!(
                "every paper source failed: {}",
                failed_sources.join(", ")
            )));
        }

        info!(new_papers = fresh.len(), since = %since, "Scoring new papers");
        let outcome = self
            .scoring
            .run_until(fresh, &CancellationToken::new())
            .await;
        let scored_count = outcome.papers.len();

        let papers: Vec<Paper> = outcome
            .papers
            .into_iter()
            .filter(|p| p.relevance_or_zero() >= self.relevance_cutoff)
            .collect();

        RunState::record_run(&self.db, now).await?;
        info!(relevant = papers.len(), scored = scored_count, "Digest finished");

        Ok(DigestReport {
            since,
            papers,
            scored: scored_count,
            failed: outcome.failed,
            failed_sources,
        })
    }
}

pub fn render_digest(report: &DigestReport) -> String {
    if report.papers.is_empty() {
        return format!(
            "No papers above the relevance cutoff since {}.",
            report.since.format("%Y-%m-%d %H:%M UTC")
        );
    }
    let mut out = format!(
        "{} relevant papers since {}\n",
        report.papers.len(),
        report.since.format("%Y-%m-%d %H:%M UTC")
    );
    for paper in &report.papers {
        out.push('\n');
        out.push_str(&paper.pretty_print());
        out.push('\n');
    }
    out
}
