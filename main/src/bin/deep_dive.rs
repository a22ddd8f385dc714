use std::sync::Arc;

use clap::Parser;
use common::utils::prompts::PromptTemplates;
use paper_scout::{
    cancel_on_ctrl_c, connect_db, init_tracing, load_config, paper_collection, scoring_pipeline,
    vector_index,
};
use retrieval_pipeline::{
    DeepDiveConfig, DeepDiveOrchestrator, JsonPaperSource, OpenRouterTermExtractor,
};
use tracing::warn;

/// Expand one paper into a ranked report of related papers.
#[derive(Debug, Parser)]
#[command(name = "deep-dive", version)]
struct Cli {
    /// External id of the seed paper, e.g. an arXiv id
    paper_id: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config()?;
    let prompts = Arc::new(PromptTemplates::new()?);

    let extractor = OpenRouterTermExtractor::from_config(&config, prompts.clone())?;
    let scoring = scoring_pipeline(&config, prompts)?;

    let db = connect_db(&config).await?;
    let collection = paper_collection(&config, vector_index(db, &config))?;
    collection.ensure().await?;

    let orchestrator = DeepDiveOrchestrator::new(
        Arc::new(JsonPaperSource::from_config(&config)),
        Arc::new(extractor),
        collection,
        scoring,
        DeepDiveConfig::from_app_config(&config),
    );

    let report = orchestrator
        .run_until(&cli.paper_id, &cancel_on_ctrl_c())
        .await?;
    if report.truncated {
        warn!("Scoring was interrupted, the related list is partial");
    }
    println!("{}", report.text);
    Ok(())
}
