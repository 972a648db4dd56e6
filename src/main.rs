//! Command-line entry point: run the sample meal planning workflow and
//! write the JSON and Markdown reports.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mealcrew::config::WorkflowConfig;
use mealcrew::llm::{GeminiClient, LlmClient, OfflineClient};
use mealcrew::plan::{Preferences, SkillLevel};
use mealcrew::{report, Coordinator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            WorkflowConfig::from_yaml_file(&path).with_context(|| format!("loading {path}"))?
        }
        None => WorkflowConfig::default(),
    };

    let llm: Arc<dyn LlmClient> = match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => {
            info!(model = %config.model, "using Gemini backend");
            Arc::new(GeminiClient::new(key, config.model.clone())?)
        }
        _ => {
            warn!("GEMINI_API_KEY not set; running in stand-in mode");
            Arc::new(OfflineClient)
        }
    };

    let preferences = Preferences::new(
        "Chicken Stir Fry",
        4,
        25.0,
        vec!["no nuts".to_string()],
        SkillLevel::Beginner,
    )?;

    let coordinator = Coordinator::new(llm, config);
    let result = coordinator.run(preferences).await;

    for (stage, entry) in &result.stages {
        info!(
            %stage,
            success = entry.is_success(),
            degraded = entry.degraded,
            "stage result"
        );
    }
    info!(status = ?result.status, "workflow status");

    report::write_json(&result, "workflow_results.json").await?;
    report::write_markdown(&result, "workflow_results.md").await?;
    info!("reports written to workflow_results.json and workflow_results.md");

    println!("{}", report::to_markdown(&result));
    Ok(())
}
