use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use common::utils::prompts::PromptTemplates;
use paper_scout::{connect_db, init_tracing, load_config, scoring_pipeline};
use retrieval_pipeline::{render_digest, Digest, JsonPaperSource, PaperSource};

/// Score papers published since the last run and print the relevant ones.
#[derive(Debug, Parser)]
#[command(name = "digest", version)]
struct Cli {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let _cli = Cli::parse();
    let config = load_config()?;
    let prompts = Arc::new(PromptTemplates::new()?);

    let scoring = scoring_pipeline(&config, prompts)?;
    let db = connect_db(&config).await?;
    let sources: Vec<Arc<dyn PaperSource>> = vec![Arc::new(JsonPaperSource::from_config(&config))];

    let digest = Digest::from_config(&config, sources, scoring, db);
    let report = digest.run(Utc::now()).await?;
    println!("{}", render_digest(&report));
    Ok(())
}
