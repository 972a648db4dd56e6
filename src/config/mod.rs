//! Workflow configuration: agent profiles, task templates, retry policy.
//!
//! Role/goal/backstory text and task prompt templates are keyed by stage
//! name and can be overridden from a YAML file; built-in defaults cover all
//! five stages so the engine runs with no external files. Templates use
//! `{variable}` placeholders with `{{`/`}}` escapes for literal braces
//! (prompts embed JSON shape examples).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::llm::RetryConfig;
use crate::stages::StageName;

/// Unresolvable template input.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TemplateError {
    #[error("missing template variable `{0}`")]
    MissingVariable(String),
    #[error("unclosed placeholder starting at byte {0}")]
    UnclosedPlaceholder(usize),
}

/// Persona text for one stage's agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

/// Configuration for one stage: its agent persona and task template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub agent: AgentProfile,
    pub template: String,
}

/// Top-level workflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Model identifier passed to the LLM backend.
    pub model: String,
    /// Hard per-stage timeout; a stage that exceeds it is treated as a
    /// transient failure and falls back to its stand-in.
    pub stage_timeout_secs: u64,
    pub retry: RetryConfig,
    /// Per-stage overrides; stages absent here use the built-in defaults.
    pub stages: BTreeMap<StageName, StageConfig>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            stage_timeout_secs: 90,
            retry: RetryConfig::default(),
            stages: BTreeMap::new(),
        }
    }
}

impl WorkflowConfig {
    /// Load overrides from a YAML file on top of the defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&text)?;
        Ok(config)
    }

    /// Effective configuration for a stage: the override if present,
    /// otherwise the built-in default.
    pub fn stage(&self, name: StageName) -> StageConfig {
        self.stages
            .get(&name)
            .cloned()
            .unwrap_or_else(|| default_stage(name))
    }
}

/// Render a template by substituting `{variable}` placeholders.
///
/// `{{` and `}}` emit literal braces. An unresolved variable is an error,
/// never an empty substitution; the coordinator treats it as a stage-local
/// recoverable failure.
pub fn render(template: &str, vars: &BTreeMap<String, String>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(TemplateError::UnclosedPlaceholder(pos));
                }
                let name = name.trim();
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => return Err(TemplateError::MissingVariable(name.to_string())),
                }
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                }
                out.push('}');
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

fn profile(role: &str, goal: &str, backstory: &str) -> AgentProfile {
    AgentProfile {
        role: role.to_string(),
        goal: goal.to_string(),
        backstory: backstory.to_string(),
    }
}

/// Built-in configuration for a stage.
pub fn default_stage(name: StageName) -> StageConfig {
    match name {
        StageName::MealPlanner => StageConfig {
            agent: profile(
                "Meal Planner & Recipe Researcher",
                "Research recipes and create a complete meal plan matching the user's constraints",
                "A seasoned recipe developer who balances taste, cost and skill level.",
            ),
            template: r#"Create a meal plan for "{meal_name}" serving {servings} people.
Budget: ${budget}. Dietary restrictions: {restrictions}. Cooking skill: {skill_level}.

Respond with ONLY a JSON object in this exact shape:
{{
  "meal_name": "...",
  "servings": {servings},
  "difficulty": "easy|medium|hard",
  "ingredients": [
    {{ "name": "...", "quantity": 1.5, "unit": "lbs" }}
  ],
  "instructions": ["step 1", "step 2"]
}}

Every ingredient needs a name, a positive quantity and a unit. Instructions
must be complete, ordered cooking steps. Do not add commentary."#
                .to_string(),
        },
        StageName::ShoppingOrganizer => StageConfig {
            agent: profile(
                "Shopping Organizer",
                "Organize the shopping list by store section for an efficient trip",
                "A grocery-store veteran who knows exactly where everything is shelved.",
            ),
            template: r#"Organize these ingredients for "{meal_name}" into a shopping list
grouped by store section (Produce, Meat & Seafood, Dairy, Pantry, Frozen, Other):

{ingredients_json}

Respond with ONLY a JSON object in this exact shape:
{{
  "categories": [
    {{
      "section": "Produce",
      "items": [ {{ "name": "...", "quantity": 2, "unit": "lbs", "estimated_price": 3.50 }} ]
    }}
  ],
  "total_estimated_cost": 24.50
}}

Include every ingredient exactly once. Estimate a realistic price per item."#
                .to_string(),
        },
        StageName::BudgetAdvisor => StageConfig {
            agent: profile(
                "Budget Advisor",
                "Check the shopping plan against the budget and suggest savings",
                "A frugal home economist with a knack for cheaper substitutions.",
            ),
            template: r#"The user's budget is ${budget}. Review this shopping plan:

{shopping_json}

Check the prices, then respond with ONLY a JSON object in this exact shape:
{{
  "estimated_total": 22.75,
  "within_budget": true,
  "tips": ["swap X for Y to save $2", "buy the store brand of Z"]
}}

Do not modify the shopping plan itself; report on it. Suggest cheaper
alternatives in the tips where prices look high."#
                .to_string(),
        },
        StageName::Leftovers => StageConfig {
            agent: profile(
                "Leftover Manager",
                "Reduce food waste by suggesting bonus recipes from partially-used ingredients",
                "A zero-waste cook who turns every spare half-onion into something good.",
            ),
            template: r#"The meal "{meal_name}" uses these ingredients:

{ingredients_json}

Suggest 2 to 3 small bonus recipes using the likely leftovers. Respond with
ONLY a JSON object in this exact shape:
{{
  "meal_name": "{meal_name}",
  "recipes": [
    {{ "name": "...", "instructions": "one short paragraph" }}
  ]
}}"#
            .to_string(),
        },
        StageName::Summary => StageConfig {
            agent: profile(
                "Report Compiler",
                "Compile a friendly final guide from all prior stage outputs",
                "A food writer who distills plans into clear, encouraging guides.",
            ),
            template: r#"Compile a short, user-friendly shopping and cooking guide for
"{meal_name}" from the workflow results below:

{context_json}

Respond with ONLY a JSON object in this exact shape:
{{
  "meal_name": "{meal_name}",
  "overview": "two or three sentences summarizing the plan",
  "tips": ["closing tip 1", "closing tip 2"]
}}"#
            .to_string(),
        },
    }
}
