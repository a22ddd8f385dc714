#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod deep_dive;
pub mod digest;
pub mod extraction;
pub mod pipeline;
pub mod scoring;
pub mod sources;

#[cfg(test)]
mod test_support;

pub use deep_dive::{render_report, DeepDiveConfig, DeepDiveOrchestrator, DeepDiveReport};
pub use digest::{render_digest, Digest, DigestReport};
pub use extraction::{OpenRouterTermExtractor, SeedAnalysis, TermExtractor};
pub use pipeline::{ScoringConfig, ScoringOutcome, ScoringPipeline};
pub use scoring::{LlmRelevanceScorer, RelevanceAssessment, RelevanceScorer};
pub use sources::{JsonPaperSource, PaperSource};
