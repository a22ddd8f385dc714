use common::error::AppError;
use state_machines::core::GuardError;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tracing::{debug, info, instrument};

use super::{
    context::DeepDiveContext,
    report::render_report,
    state::{DeepDiveMachine, Expanded, Extracted, Ready, Rendered, Resolved, Scored, Seeded},
};

#[instrument(level = "trace", skip_all, fields(seed_id = %ctx.seed_id))]
pub async fn seed(
    machine: DeepDiveMachine<(), Ready>,
    ctx: &mut DeepDiveContext<'_>,
) -> Result<DeepDiveMachine<(), Seeded>, AppError> {
    let paper = ctx.source.lookup(ctx.seed_id).await?;
    info!(seed_id = %paper.id, title = %paper.title, "deep dive seed resolved");
    ctx.seed = Some(paper);

    machine
        .seed()
        .map_err(|(_, guard)| map_guard_error("seed", &guard))
}

#[instrument(level = "trace", skip_all, fields(seed_id = %ctx.seed_id))]
pub async fn extract(
    machine: DeepDiveMachine<(), Seeded>,
    ctx: &mut DeepDiveContext<'_>,
) -> Result<DeepDiveMachine<(), Extracted>, AppError> {
    let n_terms = ctx.config.n_terms;
    let analysis = {
        let seed = ctx.seed()?;
        ctx.extractor
            .extract(seed, ctx.research_interests(), n_terms)
            .await?
    };

    let seed = ctx.seed_mut()?;
    if !analysis.detailed_summary.is_empty() {
        seed.summary = Some(analysis.detailed_summary);
    }
    if let Some(relevance) = analysis.relevance {
        seed.relevance = Some(relevance);
    }
    info!(terms = ?analysis.search_terms, "deep dive search terms extracted");
    ctx.search_terms = analysis.search_terms;

    machine
        .extract()
        .map_err(|(_, guard)| map_guard_error("extract", &guard))
}

#[instrument(level = "trace", skip_all, fields(seed_id = %ctx.seed_id, top_k = ctx.config.top_k))]
pub async fn expand(
    machine: DeepDiveMachine<(), Extracted>,
    ctx: &mut DeepDiveContext<'_>,
) -> Result<DeepDiveMachine<(), Expanded>, AppError> {
    let collection = ctx.collection;
    let top_k = ctx.config.top_k;

    for term in &ctx.search_terms {
        let retry_strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);
        let ids = RetryIf::spawn(
            retry_strategy,
            || collection.query_text(term, top_k),
            |err: &AppError| err.is_transport(),
        )
        .await?;

        debug!(term = %term, hits = ids.len(), "term expanded");
        ctx.candidate_ids
            .extend(ids.into_iter().filter(|id| id != ctx.seed_id));
    }
    info!(candidates = ctx.candidate_ids.len(), "deep dive candidates collected");

    machine
        .expand()
        .map_err(|(_, guard)| map_guard_error("expand", &guard))
}

#[instrument(level = "trace", skip_all, fields(seed_id = %ctx.seed_id))]
pub async fn resolve(
    machine: DeepDiveMachine<(), Expanded>,
    ctx: &mut DeepDiveContext<'_>,
) -> Result<DeepDiveMachine<(), Resolved>, AppError> {
    let ids: Vec<String> = ctx.candidate_ids.iter().cloned().collect();
    ctx.candidates = ctx.source.resolve(&ids).await?;
    debug!(
        requested = ids.len(),
        resolved = ctx.candidates.len(),
        "deep dive candidates resolved"
    );

    machine
        .resolve()
        .map_err(|(_, guard)| map_guard_error("resolve", &guard))
}

#[instrument(level = "trace", skip_all, fields(seed_id = %ctx.seed_id))]
pub async fn score(
    machine: DeepDiveMachine<(), Resolved>,
    ctx: &mut DeepDiveContext<'_>,
) -> Result<DeepDiveMachine<(), Scored>, AppError> {
    let candidates = std::mem::take(&mut ctx.candidates);
    let outcome = ctx.scoring.run_until(candidates, ctx.cancel).await;
    ctx.outcome = Some(outcome);

    machine
        .score()
        .map_err(|(_, guard)| map_guard_error("score", &guard))
}

pub fn render(
    machine: DeepDiveMachine<(), Scored>,
    ctx: &mut DeepDiveContext<'_>,
) -> Result<DeepDiveMachine<(), Rendered>, AppError> {
    let related = ctx
        .outcome
        .as_ref()
        .map(|outcome| outcome.papers.as_slice())
        .unwrap_or_default();
    ctx.rendered = Some(render_report(ctx.seed()?, &ctx.search_terms, related));

    machine
        .render()
        .map_err(|(_, guard)| map_guard_error("render", &guard))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid deep dive transition during {event}: {guard:?}"
    ))
}
