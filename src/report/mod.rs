//! Report output: lossless JSON and a human-readable Markdown guide.

use std::path::Path;

use anyhow::Context;

use crate::plan::{StageOutcome, StagePayload, WorkflowResult};
use crate::stages::StageName;

/// Serialize a workflow result to pretty JSON. Parsing this back with
/// [`from_json`] reproduces an equivalent result.
pub fn to_json(result: &WorkflowResult) -> anyhow::Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize workflow result")
}

/// Parse a workflow result previously produced by [`to_json`].
pub fn from_json(text: &str) -> anyhow::Result<WorkflowResult> {
    serde_json::from_str(text).context("failed to parse workflow result")
}

/// Write the JSON report to a file.
pub async fn write_json(result: &WorkflowResult, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, to_json(result)?)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Write the Markdown report to a file.
pub async fn write_markdown(result: &WorkflowResult, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, to_markdown(result))
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Render the workflow result as a Markdown document, stages in pipeline
/// order, each marked authoritative or degraded.
pub fn to_markdown(result: &WorkflowResult) -> String {
    let prefs = &result.preferences;
    let mut out = String::new();

    out.push_str(&format!("# Meal Plan: {}\n\n", prefs.meal_name));
    out.push_str(&format!(
        "- Servings: {}\n- Budget: ${:.2}\n- Restrictions: {}\n- Skill level: {}\n- Status: {:?}\n- Run: {}\n\n",
        prefs.servings,
        prefs.budget,
        if prefs.restrictions.is_empty() {
            "none".to_string()
        } else {
            prefs.restrictions.join(", ")
        },
        prefs.skill_level,
        result.status,
        result.run_id,
    ));

    for stage in StageName::SEQUENCE {
        let Some(entry) = result.stage(stage) else {
            continue;
        };
        let marker = if entry.degraded {
            "degraded"
        } else {
            "authoritative"
        };
        out.push_str(&format!("## {} ({marker})\n\n", heading(stage)));

        match &entry.outcome {
            StageOutcome::Failure { reason, .. } => {
                out.push_str(&format!("Failed: {reason}\n\n"));
            }
            StageOutcome::Success { payload } => render_payload(&mut out, payload),
        }
    }

    out
}

fn heading(stage: StageName) -> &'static str {
    match stage {
        StageName::MealPlanner => "Meal Plan",
        StageName::ShoppingOrganizer => "Shopping List",
        StageName::BudgetAdvisor => "Budget Check",
        StageName::Leftovers => "Leftover Ideas",
        StageName::Summary => "Summary",
    }
}

fn render_payload(out: &mut String, payload: &StagePayload) {
    match payload {
        StagePayload::MealPlan(plan) => {
            out.push_str(&format!(
                "Difficulty: {} - serves {}\n\nIngredients:\n",
                plan.difficulty, plan.servings
            ));
            for item in &plan.ingredients {
                out.push_str(&format!(
                    "- {} ({} {})\n",
                    item.name, item.quantity, item.unit
                ));
            }
            out.push_str("\nInstructions:\n");
            for (i, step) in plan.instructions.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, step));
            }
            out.push('\n');
        }
        StagePayload::ShoppingPlan(plan) => {
            for category in &plan.categories {
                out.push_str(&format!("### {}\n", category.section));
                for item in &category.items {
                    let price = item
                        .estimated_price
                        .map(|p| format!(" - ${p:.2}"))
                        .unwrap_or_default();
                    out.push_str(&format!(
                        "- {} ({} {}){}\n",
                        item.name, item.quantity, item.unit, price
                    ));
                }
                out.push('\n');
            }
            out.push_str(&format!(
                "Estimated total: ${:.2}\n\n",
                plan.total_estimated_cost
            ));
        }
        StagePayload::Budget(report) => {
            out.push_str(&format!(
                "Estimated total ${:.2} - {}\n\n",
                report.estimated_total,
                if report.within_budget {
                    "within budget"
                } else {
                    "over budget"
                }
            ));
            for tip in &report.tips {
                out.push_str(&format!("- {tip}\n"));
            }
            out.push('\n');
        }
        StagePayload::Leftovers(suggestion) => {
            for recipe in &suggestion.recipes {
                out.push_str(&format!("### {}\n{}\n\n", recipe.name, recipe.instructions));
            }
        }
        StagePayload::Summary(summary) => {
            out.push_str(&format!("{}\n\n", summary.overview));
            for tip in &summary.tips {
                out.push_str(&format!("- {tip}\n"));
            }
            out.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::Coordinator;
    use crate::config::WorkflowConfig;
    use crate::llm::OfflineClient;
    use crate::plan::{Preferences, SkillLevel};
    use std::sync::Arc;

    async fn sample_result() -> WorkflowResult {
        let prefs = Preferences::new("Tacos", 4, 20.0, vec![], SkillLevel::Beginner).unwrap();
        Coordinator::new(Arc::new(OfflineClient), WorkflowConfig::default())
            .run(prefs)
            .await
    }

    #[tokio::test]
    async fn test_json_round_trip_is_lossless() {
        let result = sample_result().await;
        let json = to_json(&result).unwrap();
        let back = from_json(&json).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.stages.len(), 5);
    }

    #[tokio::test]
    async fn test_json_uses_stage_name_keys() {
        let result = sample_result().await;
        let json = to_json(&result).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let stages = value["stages"].as_object().unwrap();
        for stage in StageName::SEQUENCE {
            assert!(stages.contains_key(stage.as_str()), "missing {stage} key");
        }
    }

    #[tokio::test]
    async fn test_markdown_mentions_every_stage_and_degradation() {
        let result = sample_result().await;
        let md = to_markdown(&result);
        assert!(md.contains("# Meal Plan: Tacos"));
        assert!(md.contains("## Shopping List (degraded)"));
        assert!(md.contains("## Summary (degraded)"));
        assert!(md.contains("Estimated total"));
        assert!(md.is_ascii(), "generated Markdown should stay plain ASCII");
    }

    #[tokio::test]
    async fn test_write_files() {
        let result = sample_result().await;
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("result.json");
        let md_path = dir.path().join("result.md");

        write_json(&result, &json_path).await.unwrap();
        write_markdown(&result, &md_path).await.unwrap();

        let reloaded = from_json(&tokio::fs::read_to_string(&json_path).await.unwrap()).unwrap();
        assert_eq!(reloaded.run_id, result.run_id);
        assert!(tokio::fs::read_to_string(&md_path)
            .await
            .unwrap()
            .contains("Tacos"));
    }
}
