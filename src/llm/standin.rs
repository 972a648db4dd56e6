//! Deterministic local stand-ins for model responses.
//!
//! One responder per stage, pure and dependency-free. Each emits JSON in the
//! same shape the prompts request, then flows through the normal schema
//! validator, so downstream stages cannot structurally distinguish degraded
//! data from real data; only the `degraded` flag on the stage result
//! signals it.

use serde_json::{json, Value};

use crate::plan::SkillLevel;
use crate::stages::{StageName, WorkflowContext};

/// Produce a stage-appropriate response without any network access.
pub fn respond(stage: StageName, ctx: &WorkflowContext) -> Value {
    match stage {
        StageName::MealPlanner => meal_plan(ctx),
        StageName::ShoppingOrganizer => shopping_plan(ctx),
        StageName::BudgetAdvisor => budget_report(ctx),
        StageName::Leftovers => leftovers(ctx),
        StageName::Summary => summary(ctx),
    }
}

fn meal_plan(ctx: &WorkflowContext) -> Value {
    let prefs = &ctx.preferences;
    let meat_free = prefs.restrictions.iter().any(|r| {
        let r = r.to_ascii_lowercase();
        r.contains("vegetarian") || r.contains("vegan")
    });
    let protein = if meat_free { "tofu" } else { "chicken breast" };
    let per_person = |base: f64| (base * prefs.servings as f64 * 100.0).round() / 100.0;

    let difficulty = match prefs.skill_level {
        SkillLevel::Beginner => "easy",
        SkillLevel::Intermediate => "medium",
        SkillLevel::Advanced => "hard",
    };

    json!({
        "meal_name": prefs.meal_name,
        "servings": prefs.servings,
        "difficulty": difficulty,
        "ingredients": [
            { "name": protein, "quantity": per_person(0.25), "unit": "lbs" },
            { "name": "white rice", "quantity": per_person(0.2), "unit": "cups" },
            { "name": "mixed vegetables", "quantity": per_person(0.25), "unit": "lbs" },
            { "name": "yellow onion", "quantity": 1, "unit": "whole" },
            { "name": "garlic", "quantity": 3, "unit": "cloves" },
            { "name": "cooking oil", "quantity": 2, "unit": "tbsp" },
            { "name": "seasoning blend", "quantity": 1, "unit": "tbsp" }
        ],
        "instructions": [
            format!("Prep all ingredients for {}.", prefs.meal_name),
            format!("Cook the {} until done through.", protein),
            "Cook the rice and saute the vegetables with onion and garlic.",
            "Combine everything, season, and serve hot."
        ]
    })
}

/// Store section for an ingredient, by keyword.
fn section_for(name: &str) -> &'static str {
    const TABLES: &[(&str, &[&str])] = &[
        (
            "Produce",
            &[
                "onion", "garlic", "pepper", "tomato", "lettuce", "vegetable", "carrot",
                "broccoli", "cilantro", "lime", "lemon", "potato", "avocado", "mushroom",
            ],
        ),
        (
            "Meat & Seafood",
            &["chicken", "beef", "pork", "fish", "shrimp", "turkey", "sausage"],
        ),
        (
            "Dairy",
            &["milk", "cheese", "butter", "yogurt", "cream", "egg", "tofu"],
        ),
        ("Frozen", &["frozen"]),
        (
            "Pantry",
            &[
                "rice", "oil", "flour", "sugar", "salt", "seasoning", "spice", "sauce",
                "pasta", "bean", "tortilla", "stock", "broth", "vinegar",
            ],
        ),
    ];
    let lower = name.to_ascii_lowercase();
    for (section, keywords) in TABLES {
        if keywords.iter().any(|k| lower.contains(k)) {
            return section;
        }
    }
    "Other"
}

/// Flat per-unit price by section; enough to exercise budget logic.
fn unit_price(section: &str) -> f64 {
    match section {
        "Meat & Seafood" => 5.99,
        "Dairy" => 3.49,
        "Produce" => 1.99,
        "Frozen" => 3.99,
        "Pantry" => 2.49,
        _ => 2.99,
    }
}

const SECTION_ORDER: [&str; 6] = [
    "Produce",
    "Meat & Seafood",
    "Dairy",
    "Pantry",
    "Frozen",
    "Other",
];

fn shopping_plan(ctx: &WorkflowContext) -> Value {
    let ingredients = ctx
        .meal_plan()
        .map(|p| p.ingredients.clone())
        .unwrap_or_default();

    let mut total = 0.0f64;
    let mut categories = Vec::new();
    for section in SECTION_ORDER {
        let items: Vec<Value> = ingredients
            .iter()
            .filter(|item| section_for(&item.name) == section)
            .map(|item| {
                let price =
                    (unit_price(section) * item.quantity.max(0.5) * 100.0).round() / 100.0;
                total += price;
                json!({
                    "name": item.name,
                    "quantity": item.quantity,
                    "unit": item.unit,
                    "estimated_price": price,
                })
            })
            .collect();
        if !items.is_empty() {
            categories.push(json!({ "section": section, "items": items }));
        }
    }

    json!({
        "categories": categories,
        "total_estimated_cost": (total * 100.0).round() / 100.0,
    })
}

fn budget_report(ctx: &WorkflowContext) -> Value {
    let budget = ctx.preferences.budget;
    let estimated_total = ctx
        .shopping_plan()
        .map(|p| p.total_estimated_cost)
        .unwrap_or(0.0);
    let within = estimated_total <= budget;

    let mut tips = vec![
        "Buy store brands for pantry staples.".to_string(),
        "Check the weekly circular for protein discounts.".to_string(),
    ];
    if !within {
        tips.push(format!(
            "Estimated total exceeds the ${budget:.2} budget; trim portion sizes or swap the protein."
        ));
    }

    json!({
        "estimated_total": estimated_total,
        "within_budget": within,
        "tips": tips,
    })
}

fn leftovers(ctx: &WorkflowContext) -> Value {
    let meal_name = &ctx.preferences.meal_name;
    let mut names: Vec<String> = ctx
        .meal_plan()
        .map(|p| p.ingredients.iter().map(|i| i.name.clone()).collect())
        .unwrap_or_default();
    if names.is_empty() {
        names = vec!["vegetables".to_string(), "rice".to_string()];
    }
    let first = names[0].clone();
    let second = names.get(1).cloned().unwrap_or_else(|| "rice".to_string());

    json!({
        "meal_name": meal_name,
        "recipes": [
            {
                "name": format!("Leftover {first} fried rice"),
                "instructions": format!(
                    "Dice the leftover {first}, fry with day-old rice, a splash of oil and any spare vegetables."
                ),
            },
            {
                "name": format!("{second} soup"),
                "instructions": format!(
                    "Simmer leftover {second} with stock and seasoning for a quick next-day lunch."
                ),
            }
        ]
    })
}

fn summary(ctx: &WorkflowContext) -> Value {
    let prefs = &ctx.preferences;
    let mut overview = format!(
        "Your plan for {} (serves {}) is ready.",
        prefs.meal_name, prefs.servings
    );
    if let Some(shopping) = ctx.shopping_plan() {
        overview.push_str(&format!(
            " The shopping list spans {} store sections at an estimated ${:.2}.",
            shopping.categories.len(),
            shopping.total_estimated_cost
        ));
    }
    if let Some(budget) = ctx.budget_report() {
        overview.push_str(if budget.within_budget {
            " You are within budget."
        } else {
            " The estimate runs over budget; see the savings tips."
        });
    }

    json!({
        "meal_name": prefs.meal_name,
        "overview": overview,
        "tips": [
            "Shop the store perimeter first, then the pantry aisles.",
            "Label and refrigerate leftovers within two hours of cooking.",
        ],
    })
}
