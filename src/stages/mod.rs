//! Pipeline stages.
//!
//! # Stage Sequence
//! ```text
//! MealPlanner -> ShoppingOrganizer -> BudgetAdvisor -> Leftovers -> Summary
//! ```
//!
//! Each stage consumes the accumulated [`WorkflowContext`] and produces one
//! structured result. The context is append-only: a stage publishes its
//! payload exactly once and nothing downstream edits it.

pub mod runner;
pub mod schema;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::plan::{
    BudgetReport, GroceryShoppingPlan, LeftoverSuggestion, MealPlan, Preferences, StagePayload,
};

/// The five pipeline stages, in execution order.
///
/// The derived `Ord` follows declaration order, so a
/// `BTreeMap<StageName, _>` iterates and serializes in pipeline order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    MealPlanner,
    ShoppingOrganizer,
    BudgetAdvisor,
    Leftovers,
    Summary,
}

impl StageName {
    /// Fixed execution order of the pipeline.
    pub const SEQUENCE: [StageName; 5] = [
        StageName::MealPlanner,
        StageName::ShoppingOrganizer,
        StageName::BudgetAdvisor,
        StageName::Leftovers,
        StageName::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MealPlanner => "meal_planner",
            Self::ShoppingOrganizer => "shopping_organizer",
            Self::BudgetAdvisor => "budget_advisor",
            Self::Leftovers => "leftovers",
            Self::Summary => "summary",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accumulating read-only record of published stage payloads plus the
/// original preferences. Appended to by exactly one stage at a time.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub preferences: Preferences,
    payloads: BTreeMap<StageName, StagePayload>,
}

impl WorkflowContext {
    pub fn new(preferences: Preferences) -> Self {
        Self {
            preferences,
            payloads: BTreeMap::new(),
        }
    }

    /// Publish a stage's payload. First write wins; published payloads are
    /// never retroactively edited.
    pub fn publish(&mut self, stage: StageName, payload: StagePayload) {
        self.payloads.entry(stage).or_insert(payload);
    }

    pub fn payload(&self, stage: StageName) -> Option<&StagePayload> {
        self.payloads.get(&stage)
    }

    pub fn meal_plan(&self) -> Option<&MealPlan> {
        self.payload(StageName::MealPlanner)?.as_meal_plan()
    }

    pub fn shopping_plan(&self) -> Option<&GroceryShoppingPlan> {
        self.payload(StageName::ShoppingOrganizer)?.as_shopping_plan()
    }

    pub fn budget_report(&self) -> Option<&BudgetReport> {
        self.payload(StageName::BudgetAdvisor)?.as_budget()
    }

    pub fn leftovers(&self) -> Option<&LeftoverSuggestion> {
        self.payload(StageName::Leftovers)?.as_leftovers()
    }
}

fn to_json_or(value: &impl Serialize, fallback: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| fallback.to_string())
}

/// Template variables for a stage, drawn from preferences and whatever
/// upstream payloads exist. Missing upstream data substitutes minimal
/// placeholders so downstream stages stay robust to partial failure.
pub fn prompt_vars(stage: StageName, ctx: &WorkflowContext) -> BTreeMap<String, String> {
    let prefs = &ctx.preferences;
    let mut vars = BTreeMap::new();
    let mut set = |k: &str, v: String| {
        vars.insert(k.to_string(), v);
    };

    let restrictions = if prefs.restrictions.is_empty() {
        "none".to_string()
    } else {
        prefs.restrictions.join(", ")
    };

    match stage {
        StageName::MealPlanner => {
            set("meal_name", prefs.meal_name.clone());
            set("servings", prefs.servings.to_string());
            set("budget", format!("{:.2}", prefs.budget));
            set("restrictions", restrictions);
            set("skill_level", prefs.skill_level.to_string());
        }
        StageName::ShoppingOrganizer | StageName::Leftovers => {
            set("meal_name", prefs.meal_name.clone());
            let ingredients = ctx
                .meal_plan()
                .map(|plan| to_json_or(&plan.ingredients, "[]"))
                .unwrap_or_else(|| "[]".to_string());
            set("ingredients_json", ingredients);
        }
        StageName::BudgetAdvisor => {
            set("budget", format!("{:.2}", prefs.budget));
            let shopping = ctx
                .shopping_plan()
                .map(|plan| to_json_or(plan, "{}"))
                .unwrap_or_else(|| "{}".to_string());
            set("shopping_json", shopping);
        }
        StageName::Summary => {
            set("meal_name", prefs.meal_name.clone());
            set("context_json", to_json_or(&context_digest(ctx), "{}"));
        }
    }

    vars
}

/// Compact view of prior stage outputs for the summary prompt. Stages that
/// produced nothing appear as "unavailable" rather than being omitted.
fn context_digest(ctx: &WorkflowContext) -> serde_json::Value {
    use serde_json::json;

    let meal = ctx
        .meal_plan()
        .map(|p| {
            json!({
                "meal_name": p.meal_name,
                "servings": p.servings,
                "difficulty": p.difficulty,
                "ingredient_count": p.ingredients.len(),
                "instructions": p.instructions,
            })
        })
        .unwrap_or_else(|| json!("unavailable"));

    let shopping = ctx
        .shopping_plan()
        .map(|p| {
            json!({
                "sections": p.categories.iter().map(|c| &c.section).collect::<Vec<_>>(),
                "total_estimated_cost": p.total_estimated_cost,
            })
        })
        .unwrap_or_else(|| json!("unavailable"));

    let budget = ctx
        .budget_report()
        .map(|b| {
            json!({
                "estimated_total": b.estimated_total,
                "within_budget": b.within_budget,
                "tips": b.tips,
            })
        })
        .unwrap_or_else(|| json!("unavailable"));

    let leftovers = ctx
        .leftovers()
        .map(|l| {
            json!({
                "recipes": l.recipes.iter().map(|r| &r.name).collect::<Vec<_>>(),
            })
        })
        .unwrap_or_else(|| json!("unavailable"));

    json!({
        "meal_plan": meal,
        "shopping_plan": shopping,
        "budget": budget,
        "leftovers": leftovers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{GroceryItem, SkillLevel};

    fn prefs() -> Preferences {
        Preferences::new("Tacos", 4, 20.0, vec![], SkillLevel::Beginner).unwrap()
    }

    fn sample_plan() -> MealPlan {
        MealPlan {
            meal_name: "Tacos".to_string(),
            servings: 4,
            difficulty: "easy".to_string(),
            ingredients: vec![GroceryItem {
                name: "ground beef".to_string(),
                quantity: 1.0,
                unit: "lb".to_string(),
                estimated_price: None,
            }],
            instructions: vec!["brown the beef".to_string()],
        }
    }

    #[test]
    fn test_sequence_matches_ord() {
        let mut sorted = StageName::SEQUENCE;
        sorted.sort();
        assert_eq!(sorted, StageName::SEQUENCE);
    }

    #[test]
    fn test_stage_name_serde_keys() {
        assert_eq!(
            serde_json::to_string(&StageName::ShoppingOrganizer).unwrap(),
            "\"shopping_organizer\""
        );
        let back: StageName = serde_json::from_str("\"budget_advisor\"").unwrap();
        assert_eq!(back, StageName::BudgetAdvisor);
    }

    #[test]
    fn test_publish_is_first_write_wins() {
        let mut ctx = WorkflowContext::new(prefs());
        ctx.publish(StageName::MealPlanner, StagePayload::MealPlan(sample_plan()));
        let mut other = sample_plan();
        other.meal_name = "Not Tacos".to_string();
        ctx.publish(StageName::MealPlanner, StagePayload::MealPlan(other));
        assert_eq!(ctx.meal_plan().unwrap().meal_name, "Tacos");
    }

    #[test]
    fn test_planner_vars_cover_template_inputs() {
        let ctx = WorkflowContext::new(prefs());
        let vars = prompt_vars(StageName::MealPlanner, &ctx);
        assert_eq!(vars["meal_name"], "Tacos");
        assert_eq!(vars["servings"], "4");
        assert_eq!(vars["restrictions"], "none");
        assert_eq!(vars["skill_level"], "beginner");
    }

    #[test]
    fn test_downstream_vars_placeholder_when_upstream_missing() {
        let ctx = WorkflowContext::new(prefs());
        let vars = prompt_vars(StageName::ShoppingOrganizer, &ctx);
        assert_eq!(vars["ingredients_json"], "[]");
        let vars = prompt_vars(StageName::BudgetAdvisor, &ctx);
        assert_eq!(vars["shopping_json"], "{}");
    }

    #[test]
    fn test_downstream_vars_carry_upstream_payload() {
        let mut ctx = WorkflowContext::new(prefs());
        ctx.publish(StageName::MealPlanner, StagePayload::MealPlan(sample_plan()));
        let vars = prompt_vars(StageName::Leftovers, &ctx);
        assert!(vars["ingredients_json"].contains("ground beef"));
    }
}
