//! Stage execution: render prompt, call model, validate, degrade.
//!
//! # Stage Flow
//! ```text
//! 1. Render the stage's task template from the accumulated context
//! 2. Call the model inside the per-stage timeout (retries included)
//! 3. Repair + validate the free-text response against the stage schema
//! 4. On any failure, fall back to the deterministic stand-in
//! ```
//!
//! All five stages share exactly these semantics; nothing stage-specific
//! lives here beyond the template/schema lookup.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{render, WorkflowConfig};
use crate::llm::{standin, LlmClient};
use crate::plan::{StagePayload, StageResult};
use crate::repair::{extract_json, ParseError};
use crate::stages::schema::parse_payload;
use crate::stages::{prompt_vars, StageName, WorkflowContext};

/// Outcome of running one stage.
pub struct StageRun {
    /// What gets recorded in the final workflow result.
    pub result: StageResult,
    /// Payload to publish into the context for downstream stages. Present
    /// even for some recorded failures (the stand-in recovered), absent only
    /// when the stand-in itself failed its schema.
    pub payload: Option<StagePayload>,
    /// The model reported a fatal condition; the coordinator should latch
    /// into stand-in mode for the remainder of the run.
    pub hit_fatal: bool,
}

/// Executes stages against a model client and workflow configuration.
pub struct StageRunner<'a> {
    llm: &'a dyn LlmClient,
    config: &'a WorkflowConfig,
}

impl<'a> StageRunner<'a> {
    pub fn new(llm: &'a dyn LlmClient, config: &'a WorkflowConfig) -> Self {
        Self { llm, config }
    }

    /// Run one stage. `standin_only` skips the model entirely (fatal latch
    /// or offline mode).
    pub async fn run(
        &self,
        stage: StageName,
        ctx: &WorkflowContext,
        standin_only: bool,
    ) -> StageRun {
        if standin_only {
            debug!(%stage, "running in stand-in mode");
            return self.standin_run(stage, ctx, None, false);
        }

        let stage_cfg = self.config.stage(stage);
        let task = match render(&stage_cfg.template, &prompt_vars(stage, ctx)) {
            Ok(task) => task,
            Err(err) => {
                // A broken template is a configuration bug, not a model
                // failure: record it as a stage failure, but still publish
                // the stand-in payload so downstream stages can proceed.
                warn!(%stage, %err, "template rendering failed");
                let mut run = self.standin_run(stage, ctx, None, false);
                run.result = StageResult::failure(err.to_string(), None);
                return run;
            }
        };

        let prompt = format!(
            "You are {}.\nGoal: {}\nBackstory: {}\n\n{}",
            stage_cfg.agent.role, stage_cfg.agent.goal, stage_cfg.agent.backstory, task
        );

        let timeout = Duration::from_secs(self.config.stage_timeout_secs);
        match tokio::time::timeout(timeout, self.llm.complete(&prompt)).await {
            Ok(Ok(text)) => match parse_response(stage, &text) {
                Ok(payload) => {
                    info!(%stage, "stage completed with authoritative model output");
                    StageRun {
                        result: StageResult::success(payload.clone(), false),
                        payload: Some(payload),
                        hit_fatal: false,
                    }
                }
                Err(err) => {
                    warn!(%stage, %err, "model output failed validation; using stand-in");
                    self.standin_run(stage, ctx, Some(text), false)
                }
            },
            Ok(Err(err)) => {
                let hit_fatal = err.is_fatal();
                warn!(%stage, %err, hit_fatal, "model call failed; using stand-in");
                self.standin_run(stage, ctx, None, hit_fatal)
            }
            Err(_) => {
                warn!(%stage, timeout_secs = self.config.stage_timeout_secs, "stage timed out; using stand-in");
                self.standin_run(stage, ctx, None, false)
            }
        }
    }

    /// Produce this stage's result from the local stand-in. If even the
    /// stand-in output fails its own schema, that is a configuration bug:
    /// report failure with the diagnostic text.
    fn standin_run(
        &self,
        stage: StageName,
        ctx: &WorkflowContext,
        raw_model_text: Option<String>,
        hit_fatal: bool,
    ) -> StageRun {
        let value = standin::respond(stage, ctx);
        match parse_payload(stage, &value) {
            Ok(payload) => StageRun {
                result: StageResult::success(payload.clone(), true),
                payload: Some(payload),
                hit_fatal,
            },
            Err(err) => StageRun {
                result: StageResult::failure(
                    format!("stand-in output failed its schema: {err}"),
                    raw_model_text.or_else(|| Some(value.to_string())),
                ),
                payload: None,
                hit_fatal,
            },
        }
    }
}

/// Repair free text into the stage's typed payload.
fn parse_response(stage: StageName, text: &str) -> Result<StagePayload, ParseError> {
    let value = extract_json(text)?;
    parse_payload(stage, &value)
}
