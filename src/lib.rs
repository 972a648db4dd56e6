//! mealcrew - sequential multi-stage LLM workflow engine for meal and
//! grocery planning.
//!
//! The pipeline runs five reasoning stages in a fixed order (meal planning,
//! shopping-list organization, budget analysis, leftover suggestions,
//! summary compilation), each backed by a model call with retry, per-stage
//! timeout, schema validation/repair, and graceful degradation to
//! deterministic local stand-ins.

pub mod config;
pub mod coordinator;
pub mod llm;
pub mod plan;
pub mod repair;
pub mod report;
pub mod stages;

pub use coordinator::Coordinator;
pub use plan::{Preferences, SkillLevel, WorkflowResult, WorkflowStatus};
pub use stages::StageName;
