use std::collections::BTreeSet;

use common::{error::AppError, storage::collection::PaperCollection, storage::types::paper::Paper};
use tokio_util::sync::CancellationToken;
use tracing::error;

use super::DeepDiveConfig;
use crate::{
    extraction::TermExtractor,
    pipeline::{ScoringOutcome, ScoringPipeline},
    sources::PaperSource,
};

pub struct DeepDiveContext<'a> {
    pub seed_id: &'a str,
    pub source: &'a dyn PaperSource,
    pub extractor: &'a dyn TermExtractor,
    pub collection: &'a PaperCollection,
    pub scoring: &'a ScoringPipeline,
    pub config: &'a DeepDiveConfig,
    pub cancel: &'a CancellationToken,
    pub seed: Option<Paper>,
    pub search_terms: Vec<String>,
    pub candidate_ids: BTreeSet<String>,
    pub candidates: Vec<Paper>,
    pub outcome: Option<ScoringOutcome>,
    pub rendered: Option<String>,
}

impl<'a> DeepDiveContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        seed_id: &'a str,
        source: &'a dyn PaperSource,
        extractor: &'a dyn TermExtractor,
        collection: &'a PaperCollection,
        scoring: &'a ScoringPipeline,
        config: &'a DeepDiveConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            seed_id,
            source,
            extractor,
            collection,
            scoring,
            config,
            cancel,
            seed: None,
            search_terms: Vec::new(),
            candidate_ids: BTreeSet::new(),
            candidates: Vec::new(),
            outcome: None,
            rendered: None,
        }
    }

    pub fn research_interests(&self) -> &[String] {
        &self.scoring.config().research_interests
    }

    pub fn seed(&self) -> Result<&Paper, AppError> {
        self.seed
            .as_ref()
            .ok_or_else(|| AppError::InternalError("seed paper expected to be resolved".into()))
    }

    pub fn seed_mut(&mut self) -> Result<&mut Paper, AppError> {
        self.seed
            .as_mut()
            .ok_or_else(|| AppError::InternalError("seed paper expected to be resolved".into()))
    }

    pub fn take_outcome(&mut self) -> Result<ScoringOutcome, AppError> {
        self.outcome
            .take()
            .ok_or_else(|| AppError::InternalError("scoring outcome expected to be available".into()))
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(
            seed_id = %self.seed_id,
            terms = self.search_terms.len(),
            candidates = self.candidate_ids.len(),
            error = %err,
            "deep dive aborted"
        );
        err
    }
}
