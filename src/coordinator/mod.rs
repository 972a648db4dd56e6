//! Workflow coordinator - drives the fixed stage sequence.
//!
//! # Responsibilities
//! 1. Run each stage in order with the accumulated context
//! 2. Publish every stage's payload into the context, append-only
//! 3. Latch into stand-in mode after the first fatal model error
//! 4. Short-circuit downstream stages if the planner fails irrecoverably
//! 5. Fold per-stage results into the overall workflow status
//!
//! Every stage always executes regardless of its predecessor's outcome;
//! downstream stages receive whatever payload is available (real or
//! stand-in) and must tolerate partial upstream data. The one exception is
//! total planner failure: nothing downstream can work without a meal plan,
//! so the remaining stages are recorded as failed without being invoked.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::llm::{LlmClient, RetryingClient};
use crate::plan::{Preferences, StageResult, WorkflowResult, WorkflowStatus};
use crate::stages::runner::StageRunner;
use crate::stages::{StageName, WorkflowContext};

/// Drives the five-stage pipeline against a pluggable model client.
pub struct Coordinator {
    llm: Arc<dyn LlmClient>,
    config: WorkflowConfig,
    cancel_token: Option<CancellationToken>,
}

impl Coordinator {
    pub fn new(llm: Arc<dyn LlmClient>, config: WorkflowConfig) -> Self {
        Self {
            llm,
            config,
            cancel_token: None,
        }
    }

    /// Attach a cancellation token, checked before each stage starts.
    /// There is no mid-stage cancellation; stage timeouts bound every call.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .map(|t| t.is_cancelled())
            .unwrap_or(false)
    }

    /// Run the full workflow. Always terminates with exactly one result per
    /// stage, whatever the model does.
    pub async fn run(&self, preferences: Preferences) -> WorkflowResult {
        let run_id = Uuid::new_v4();
        info!(%run_id, meal = %preferences.meal_name, "starting meal planning workflow");

        let retrying = RetryingClient::new(Arc::clone(&self.llm), self.config.retry.clone());
        let runner = StageRunner::new(&retrying, &self.config);

        let mut ctx = WorkflowContext::new(preferences.clone());
        let mut results: BTreeMap<StageName, StageResult> = BTreeMap::new();
        let mut standin_only = false;
        let mut planner_failed_hard = false;

        for stage in StageName::SEQUENCE {
            if self.is_cancelled() {
                warn!(%stage, "workflow cancelled before stage started");
                results.insert(
                    stage,
                    StageResult::failure("workflow cancelled before stage started", None),
                );
                if stage == StageName::MealPlanner {
                    planner_failed_hard = true;
                }
                continue;
            }

            if planner_failed_hard {
                results.insert(
                    stage,
                    StageResult::failure("upstream meal plan unavailable", None),
                );
                continue;
            }

            let run = runner.run(stage, &ctx, standin_only).await;

            if run.hit_fatal && !standin_only {
                warn!(%stage, "fatal model error; remaining stages run on stand-ins");
                standin_only = true;
            }

            match run.payload {
                Some(payload) => ctx.publish(stage, payload),
                None if stage == StageName::MealPlanner => {
                    // Both the model and the stand-in failed to produce a
                    // meal plan. Downstream stages have nothing to consume.
                    planner_failed_hard = true;
                }
                None => {}
            }

            results.insert(stage, run.result);
        }

        let status = fold_status(&results, planner_failed_hard);
        info!(%run_id, ?status, "workflow finished");

        WorkflowResult {
            run_id,
            generated_at: Utc::now(),
            preferences,
            status,
            stages: results,
        }
    }
}

/// Overall status: `Failed` only on irrecoverable planner failure,
/// `Complete` only when every stage succeeded authoritatively.
fn fold_status(
    results: &BTreeMap<StageName, StageResult>,
    planner_failed_hard: bool,
) -> WorkflowStatus {
    if planner_failed_hard {
        return WorkflowStatus::Failed;
    }
    let all_authoritative = results
        .values()
        .all(|r| r.is_success() && !r.degraded);
    if all_authoritative {
        WorkflowStatus::Complete
    } else {
        WorkflowStatus::PartialDegraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageConfig;
    use crate::llm::testing::{fast_retry, ScriptedClient};
    use crate::llm::{LlmError, OfflineClient};
    use crate::plan::{SkillLevel, StageOutcome};
    use serde_json::json;

    fn prefs(meal: &str) -> Preferences {
        Preferences::new(meal, 4, 20.0, vec![], SkillLevel::Beginner).unwrap()
    }

    fn fast_config() -> WorkflowConfig {
        WorkflowConfig {
            retry: fast_retry(),
            ..WorkflowConfig::default()
        }
    }

    fn stage_responses(meal: &str) -> Vec<Result<String, LlmError>> {
        vec![
            Ok(json!({
                "meal_name": meal,
                "servings": 4,
                "difficulty": "easy",
                "ingredients": [
                    { "name": "ground beef", "quantity": 1, "unit": "lb" },
                    { "name": "tortillas", "quantity": 12, "unit": "count" }
                ],
                "instructions": ["brown the beef", "assemble"]
            })
            .to_string()),
            Ok(json!({
                "categories": [
                    { "section": "Meat & Seafood", "items": [
                        { "name": "ground beef", "quantity": 1, "unit": "lb", "estimated_price": 5.99 }
                    ]},
                    { "section": "Pantry", "items": [
                        { "name": "tortillas", "quantity": 12, "unit": "count", "estimated_price": 3.49 }
                    ]}
                ],
                "total_estimated_cost": 9.48
            })
            .to_string()),
            Ok(json!({
                "estimated_total": 9.48,
                "within_budget": true,
                "tips": ["prices look fine"]
            })
            .to_string()),
            Ok(json!({
                "meal_name": meal,
                "recipes": [
                    { "name": "beef rice bowl", "instructions": "reheat with rice" },
                    { "name": "quesadillas", "instructions": "fold and fry" }
                ]
            })
            .to_string()),
            Ok(json!({
                "meal_name": meal,
                "overview": format!("Everything for {meal} is ready."),
                "tips": ["enjoy"]
            })
            .to_string()),
        ]
    }

    #[tokio::test]
    async fn test_full_run_with_cooperative_model_is_complete() {
        let client = Arc::new(ScriptedClient::new(stage_responses("Tacos")));
        let coordinator = Coordinator::new(client.clone(), fast_config());
        let result = coordinator.run(prefs("Tacos")).await;

        assert_eq!(result.status, WorkflowStatus::Complete);
        assert_eq!(result.stages.len(), 5);
        for stage in StageName::SEQUENCE {
            let entry = result.stage(stage).unwrap();
            assert!(entry.is_success(), "{stage} should succeed");
            assert!(!entry.degraded, "{stage} should be authoritative");
        }
        assert_eq!(client.call_count(), 5);
    }

    #[tokio::test]
    async fn test_always_fatal_client_degrades_every_stage() {
        let coordinator = Coordinator::new(Arc::new(OfflineClient), fast_config());
        let result = coordinator.run(prefs("Anything At All")).await;

        assert_eq!(result.stages.len(), 5);
        for stage in StageName::SEQUENCE {
            let entry = result.stage(stage).unwrap();
            assert!(entry.degraded, "{stage} should be degraded");
            assert!(entry.is_success(), "{stage} stand-in should succeed");
        }
        assert_eq!(result.status, WorkflowStatus::PartialDegraded);
    }

    #[tokio::test]
    async fn test_fatal_latch_stops_remote_calls() {
        // One fatal response; anything after would come from the script.
        let client = Arc::new(ScriptedClient::new(vec![Err(LlmError::fatal("bad key"))]));
        let coordinator = Coordinator::new(client.clone(), fast_config());
        let result = coordinator.run(prefs("Tacos")).await;

        assert_eq!(client.call_count(), 1, "no remote calls after the fatal");
        assert_eq!(result.status, WorkflowStatus::PartialDegraded);
    }

    #[tokio::test]
    async fn test_transient_failures_within_retry_budget_stay_authoritative() {
        let mut script = vec![
            Err(LlmError::transient("rate limited")),
            Err(LlmError::transient("rate limited")),
        ];
        script.extend(stage_responses("Tacos"));
        let client = Arc::new(ScriptedClient::new(script));
        let coordinator = Coordinator::new(client, fast_config());
        let result = coordinator.run(prefs("Tacos")).await;

        let planner = result.stage(StageName::MealPlanner).unwrap();
        assert!(planner.is_success());
        assert!(!planner.degraded, "recovered within retries, not degraded");
        assert_eq!(result.status, WorkflowStatus::Complete);
    }

    #[tokio::test]
    async fn test_tacos_standin_scenario() {
        let coordinator = Coordinator::new(Arc::new(OfflineClient), fast_config());
        let result = coordinator.run(prefs("Tacos")).await;

        let meal_plan = result
            .stage(StageName::MealPlanner)
            .and_then(|r| r.payload())
            .and_then(|p| p.as_meal_plan())
            .expect("planner payload");
        assert_eq!(meal_plan.servings, 4);

        let shopping = result
            .stage(StageName::ShoppingOrganizer)
            .and_then(|r| r.payload())
            .and_then(|p| p.as_shopping_plan())
            .expect("shopping payload");
        // Categories partition the meal plan's ingredients exactly.
        let mut shopped: Vec<&str> = shopping.all_items().map(|i| i.name.as_str()).collect();
        let mut planned: Vec<&str> =
            meal_plan.ingredients.iter().map(|i| i.name.as_str()).collect();
        shopped.sort();
        planned.sort();
        assert_eq!(shopped, planned);

        let summary = result
            .stage(StageName::Summary)
            .and_then(|r| r.payload())
            .and_then(|p| p.as_summary())
            .expect("summary payload");
        assert!(summary.overview.contains("Tacos"));
    }

    #[tokio::test]
    async fn test_broken_planner_template_is_partial_not_failed() {
        let mut config = fast_config();
        let mut planner_cfg: StageConfig = config.stage(StageName::MealPlanner);
        planner_cfg.template = "Make {meal_name} for {missing_count} people.".to_string();
        config.stages.insert(StageName::MealPlanner, planner_cfg);

        let coordinator = Coordinator::new(Arc::new(OfflineClient), config);
        let result = coordinator.run(prefs("Tacos")).await;

        let planner = result.stage(StageName::MealPlanner).unwrap();
        match &planner.outcome {
            StageOutcome::Failure { reason, .. } => {
                assert!(reason.contains("missing_count"));
            }
            other => panic!("expected planner failure, got {other:?}"),
        }

        // Downstream stages still executed and produced entries.
        assert_eq!(result.stages.len(), 5);
        for stage in StageName::SEQUENCE.into_iter().skip(1) {
            assert!(result.stage(stage).is_some(), "{stage} entry missing");
        }
        assert_eq!(result.status, WorkflowStatus::PartialDegraded);
    }

    #[tokio::test]
    async fn test_cancellation_before_start_fails_all_stages() {
        let token = CancellationToken::new();
        token.cancel();
        let coordinator =
            Coordinator::new(Arc::new(OfflineClient), fast_config()).with_cancellation(token);
        let result = coordinator.run(prefs("Tacos")).await;

        assert_eq!(result.stages.len(), 5);
        assert!(result.stages.values().all(|r| !r.is_success()));
        assert_eq!(result.status, WorkflowStatus::Failed);
    }

    #[tokio::test]
    async fn test_stage_entries_follow_pipeline_order() {
        let coordinator = Coordinator::new(Arc::new(OfflineClient), fast_config());
        let result = coordinator.run(prefs("Tacos")).await;
        let keys: Vec<StageName> = result.stages.keys().copied().collect();
        assert_eq!(keys, StageName::SEQUENCE.to_vec());
    }
}
