//! Domain data model for the meal planning workflow.
//!
//! # Key Concepts
//! - Preferences: the immutable user request that seeds the pipeline
//! - Stage payloads: one structured output type per pipeline stage
//! - StageResult: tagged success/failure plus a degraded flag
//! - WorkflowResult: the final aggregate, always five stage entries
//!
//! Downstream stages attach sibling structures (budget report, leftovers)
//! rather than editing upstream payloads; nothing here is mutated after a
//! stage publishes it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::repair::parse_money;
use crate::stages::StageName;

/// Cooking skill level of the requesting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        };
        f.write_str(s)
    }
}

impl FromStr for SkillLevel {
    type Err = PreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(PreferenceError::UnknownSkillLevel(other.to_string())),
        }
    }
}

/// Invalid user preferences.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PreferenceError {
    #[error("meal name must not be empty")]
    EmptyMealName,
    #[error("servings must be a positive integer")]
    ZeroServings,
    #[error("budget must be greater than zero, got {0}")]
    NonPositiveBudget(f64),
    #[error("unknown skill level `{0}`")]
    UnknownSkillLevel(String),
}

/// User request that seeds the workflow. Read-only through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub meal_name: String,
    pub servings: u32,
    /// Accepts a plain number or a currency-formatted string on input.
    #[serde(deserialize_with = "de_budget")]
    pub budget: f64,
    /// Accepts a single string or a list of strings on input.
    #[serde(default, deserialize_with = "de_restrictions")]
    pub restrictions: Vec<String>,
    pub skill_level: SkillLevel,
}

impl Preferences {
    pub fn new(
        meal_name: impl Into<String>,
        servings: u32,
        budget: f64,
        restrictions: Vec<String>,
        skill_level: SkillLevel,
    ) -> Result<Self, PreferenceError> {
        let meal_name = meal_name.into();
        if meal_name.trim().is_empty() {
            return Err(PreferenceError::EmptyMealName);
        }
        if servings == 0 {
            return Err(PreferenceError::ZeroServings);
        }
        if budget <= 0.0 {
            return Err(PreferenceError::NonPositiveBudget(budget));
        }
        Ok(Self {
            meal_name,
            servings,
            budget,
            restrictions,
            skill_level,
        })
    }
}

fn de_budget<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    use serde::de::Error;
    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::custom("budget out of range")),
        serde_json::Value::String(s) => {
            parse_money(s).ok_or_else(|| Error::custom(format!("unparseable budget `{s}`")))
        }
        _ => Err(Error::custom("budget must be a number or currency string")),
    }
}

fn de_restrictions<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    use serde::de::Error;
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("none") {
                Ok(Vec::new())
            } else {
                Ok(vec![s.to_string()])
            }
        }
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => Ok(s),
                other => Err(Error::custom(format!("non-string restriction: {other}"))),
            })
            .collect(),
        serde_json::Value::Null => Ok(Vec::new()),
        _ => Err(Error::custom("restrictions must be a string or a list")),
    }
}

/// One grocery item. Price is unknown until the budget stage has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroceryItem {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_price: Option<f64>,
}

/// Output of the planner stage. Never mutated downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlan {
    pub meal_name: String,
    pub servings: u32,
    pub difficulty: String,
    pub ingredients: Vec<GroceryItem>,
    pub instructions: Vec<String>,
}

/// One store section of the shopping list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingCategory {
    pub section: String,
    pub items: Vec<GroceryItem>,
}

/// Output of the organizer stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroceryShoppingPlan {
    pub categories: Vec<ShoppingCategory>,
    pub total_estimated_cost: f64,
}

impl GroceryShoppingPlan {
    /// All items across every category, in category order.
    pub fn all_items(&self) -> impl Iterator<Item = &GroceryItem> {
        self.categories.iter().flat_map(|c| c.items.iter())
    }
}

/// Output of the budget stage. A sibling annotation of the shopping plan,
/// never an in-place edit of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetReport {
    pub estimated_total: f64,
    pub within_budget: bool,
    pub tips: Vec<String>,
}

/// One bonus recipe built from partially-used ingredients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusRecipe {
    pub name: String,
    pub instructions: String,
}

/// Output of the leftovers stage: 2-3 bonus recipes for the meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeftoverSuggestion {
    pub meal_name: String,
    pub recipes: Vec<BonusRecipe>,
}

/// Output of the summary stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealSummary {
    pub meal_name: String,
    pub overview: String,
    pub tips: Vec<String>,
}

/// Structured payload of a single stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StagePayload {
    MealPlan(MealPlan),
    ShoppingPlan(GroceryShoppingPlan),
    Budget(BudgetReport),
    Leftovers(LeftoverSuggestion),
    Summary(MealSummary),
}

impl StagePayload {
    pub fn as_meal_plan(&self) -> Option<&MealPlan> {
        match self {
            Self::MealPlan(plan) => Some(plan),
            _ => None,
        }
    }

    pub fn as_shopping_plan(&self) -> Option<&GroceryShoppingPlan> {
        match self {
            Self::ShoppingPlan(plan) => Some(plan),
            _ => None,
        }
    }

    pub fn as_budget(&self) -> Option<&BudgetReport> {
        match self {
            Self::Budget(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_leftovers(&self) -> Option<&LeftoverSuggestion> {
        match self {
            Self::Leftovers(suggestion) => Some(suggestion),
            _ => None,
        }
    }

    pub fn as_summary(&self) -> Option<&MealSummary> {
        match self {
            Self::Summary(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Success or failure of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Success {
        payload: StagePayload,
    },
    Failure {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_model_text: Option<String>,
    },
}

/// What a stage produced, and whether a stand-in produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    #[serde(flatten)]
    pub outcome: StageOutcome,
    /// True when the payload came from the local stand-in generator (or the
    /// stage failed and fell back to one). Consumers use this to decide
    /// whether to trust e.g. budget numbers.
    pub degraded: bool,
}

impl StageResult {
    pub fn success(payload: StagePayload, degraded: bool) -> Self {
        Self {
            outcome: StageOutcome::Success { payload },
            degraded,
        }
    }

    pub fn failure(reason: impl Into<String>, raw_model_text: Option<String>) -> Self {
        Self {
            outcome: StageOutcome::Failure {
                reason: reason.into(),
                raw_model_text,
            },
            degraded: true,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, StageOutcome::Success { .. })
    }

    pub fn payload(&self) -> Option<&StagePayload> {
        match &self.outcome {
            StageOutcome::Success { payload } => Some(payload),
            StageOutcome::Failure { .. } => None,
        }
    }
}

/// Overall status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Every stage succeeded with authoritative model output.
    Complete,
    /// At least one stage degraded or failed, but downstream stages could
    /// proceed with placeholder data.
    PartialDegraded,
    /// The planner (the root dependency) failed with no recoverable fallback.
    Failed,
}

/// Final aggregate of a workflow run. Exactly one entry per stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub preferences: Preferences,
    pub status: WorkflowStatus,
    pub stages: BTreeMap<StageName, StageResult>,
}

impl WorkflowResult {
    pub fn stage(&self, name: StageName) -> Option<&StageResult> {
        self.stages.get(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_preferences_validation() {
        assert!(Preferences::new("Tacos", 4, 20.0, vec![], SkillLevel::Beginner).is_ok());
        assert!(matches!(
            Preferences::new("", 4, 20.0, vec![], SkillLevel::Beginner),
            Err(PreferenceError::EmptyMealName)
        ));
        assert!(matches!(
            Preferences::new("Tacos", 0, 20.0, vec![], SkillLevel::Beginner),
            Err(PreferenceError::ZeroServings)
        ));
        assert!(matches!(
            Preferences::new("Tacos", 4, 0.0, vec![], SkillLevel::Beginner),
            Err(PreferenceError::NonPositiveBudget(_))
        ));
    }

    #[test]
    fn test_preferences_lenient_budget_and_restrictions() {
        let prefs: Preferences = serde_json::from_value(json!({
            "meal_name": "Chicken Stir Fry",
            "servings": 4,
            "budget": "$25",
            "restrictions": "no nuts",
            "skill_level": "beginner"
        }))
        .unwrap();
        assert_eq!(prefs.budget, 25.0);
        assert_eq!(prefs.restrictions, vec!["no nuts".to_string()]);
        assert_eq!(prefs.skill_level, SkillLevel::Beginner);
    }

    #[test]
    fn test_restrictions_none_means_empty() {
        let prefs: Preferences = serde_json::from_value(json!({
            "meal_name": "Tacos",
            "servings": 2,
            "budget": 20,
            "restrictions": "none",
            "skill_level": "advanced"
        }))
        .unwrap();
        assert!(prefs.restrictions.is_empty());
    }

    #[test]
    fn test_skill_level_from_str() {
        assert_eq!(
            " Intermediate ".parse::<SkillLevel>().unwrap(),
            SkillLevel::Intermediate
        );
        assert!("expert".parse::<SkillLevel>().is_err());
    }

    #[test]
    fn test_stage_result_serde_round_trip() {
        let result = StageResult::success(
            StagePayload::Budget(BudgetReport {
                estimated_total: 18.5,
                within_budget: true,
                tips: vec!["buy store brands".to_string()],
            }),
            true,
        );
        let json = serde_json::to_string(&result).unwrap();
        let back: StageResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
        assert!(back.degraded);
    }

    #[test]
    fn test_failure_carries_raw_text() {
        let result = StageResult::failure("parse error", Some("not json".to_string()));
        assert!(!result.is_success());
        assert!(result.payload().is_none());
        match &result.outcome {
            StageOutcome::Failure { raw_model_text, .. } => {
                assert_eq!(raw_model_text.as_deref(), Some("not json"));
            }
            _ => panic!("expected failure"),
        }
    }
}
