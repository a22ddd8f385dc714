use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use common::{error::AppError, storage::types::paper::Paper};
use tokio_util::sync::CancellationToken;

use crate::scoring::{RelevanceAssessment, RelevanceScorer};

pub fn paper(id: &str) -> Paper {
    paper_published(id, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
}

pub fn paper_published(id: &str, published: DateTime<Utc>) -> Paper {
    Paper {
        id: id.to_string(),
        title: format!("Title of {id}"),
        authors: vec!["A. Author".to_string()],
        abstract_text: format!("Abstract of {id}"),
        abstract_link: None,
        full_text_link: format!("https://example.org/{id}.pdf"),
        published,
        summary: None,
        relevance: None,
    }
}

/// Scorer with canned relevance per id, optional failures and in-flight tracking.
#[derive(Default)]
pub struct ScriptedScorer {
    pub relevance: HashMap<String, u8>,
    pub failing: HashSet<String>,
    pub cancel_on: Option<(String, CancellationToken)>,
    pub delay: Duration,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedScorer {
    pub fn with_relevance(pairs: &[(&str, u8)]) -> Self {
        Self {
            relevance: pairs
                .iter()
                .map(|(id, score)| ((*id).to_string(), *score))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn cancel_on(mut self, id: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((id.to_string(), token));
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl RelevanceScorer for ScriptedScorer {
    async fn score(
        &self,
        paper: &Paper,
        _research_interests: &[String],
    ) -> Result<RelevanceAssessment, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some((id, token)) = &self.cancel_on {
            if id == &paper.id {
                token.cancel();
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&paper.id) {
            return Err(AppError::Communication(format!(
                "scoring backend unavailable for {}",
                paper.id
            )));
        }
        Ok(RelevanceAssessment {
            summary: format!("Summary of {}", paper.id),
            relevance: self.relevance.get(&paper.id).copied().unwrap_or(0),
        })
    }
}
