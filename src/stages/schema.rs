//! Per-stage payload schemas.
//!
//! Converts a repaired JSON value into the stage's typed payload. Required
//! fields are enforced here; the lenient coercions (numeric strings,
//! currency strings, bare string for a list) live in [`crate::repair`].

use serde_json::Value;

use crate::plan::{
    BonusRecipe, BudgetReport, GroceryItem, GroceryShoppingPlan, LeftoverSuggestion, MealPlan,
    MealSummary, ShoppingCategory, StagePayload,
};
use crate::repair::{
    array_field, as_object, bool_field, f64_field, opt_money_field, str_field, string_list,
    u32_field, ParseError,
};
use crate::stages::StageName;

/// Parse a JSON value into the payload expected from `stage`.
pub fn parse_payload(stage: StageName, value: &Value) -> Result<StagePayload, ParseError> {
    match stage {
        StageName::MealPlanner => parse_meal_plan(value).map(StagePayload::MealPlan),
        StageName::ShoppingOrganizer => parse_shopping_plan(value).map(StagePayload::ShoppingPlan),
        StageName::BudgetAdvisor => parse_budget_report(value).map(StagePayload::Budget),
        StageName::Leftovers => parse_leftovers(value).map(StagePayload::Leftovers),
        StageName::Summary => parse_summary(value).map(StagePayload::Summary),
    }
}

fn parse_grocery_item(value: &Value) -> Result<GroceryItem, ParseError> {
    let obj = as_object(value, "ingredient")?;
    let name = str_field(obj, "name")?;
    let quantity = f64_field(obj, "quantity")?;
    if quantity <= 0.0 {
        return Err(ParseError::invalid("quantity", "must be positive"));
    }
    let unit = str_field(obj, "unit")?;
    let estimated_price = opt_money_field(obj, "estimated_price")?;
    if let Some(price) = estimated_price {
        if price < 0.0 {
            return Err(ParseError::invalid("estimated_price", "must not be negative"));
        }
    }
    Ok(GroceryItem {
        name,
        quantity,
        unit,
        estimated_price,
    })
}

fn parse_meal_plan(value: &Value) -> Result<MealPlan, ParseError> {
    let obj = as_object(value, "meal_plan")?;
    let ingredients: Vec<GroceryItem> = array_field(obj, "ingredients")?
        .iter()
        .map(parse_grocery_item)
        .collect::<Result<_, _>>()?;
    if ingredients.is_empty() {
        return Err(ParseError::invalid("ingredients", "must not be empty"));
    }
    let instructions = string_list(obj, "instructions")?;
    if instructions.is_empty() || instructions.iter().any(|s| s.trim().is_empty()) {
        return Err(ParseError::invalid(
            "instructions",
            "must be a non-empty list of non-empty steps",
        ));
    }
    let servings = u32_field(obj, "servings")?;
    if servings == 0 {
        return Err(ParseError::invalid("servings", "must be positive"));
    }
    Ok(MealPlan {
        meal_name: str_field(obj, "meal_name")?,
        servings,
        difficulty: str_field(obj, "difficulty")?,
        ingredients,
        instructions,
    })
}

fn parse_shopping_plan(value: &Value) -> Result<GroceryShoppingPlan, ParseError> {
    let obj = as_object(value, "shopping_plan")?;
    let categories: Vec<ShoppingCategory> = array_field(obj, "categories")?
        .iter()
        .map(|cat| {
            let cat = as_object(cat, "category")?;
            Ok(ShoppingCategory {
                section: str_field(cat, "section")?,
                items: array_field(cat, "items")?
                    .iter()
                    .map(parse_grocery_item)
                    .collect::<Result<_, _>>()?,
            })
        })
        .collect::<Result<_, ParseError>>()?;
    let total = f64_field(obj, "total_estimated_cost")?;
    if total < 0.0 {
        return Err(ParseError::invalid(
            "total_estimated_cost",
            "must not be negative",
        ));
    }
    Ok(GroceryShoppingPlan {
        categories,
        total_estimated_cost: total,
    })
}

fn parse_budget_report(value: &Value) -> Result<BudgetReport, ParseError> {
    let obj = as_object(value, "budget")?;
    Ok(BudgetReport {
        estimated_total: f64_field(obj, "estimated_total")?,
        within_budget: bool_field(obj, "within_budget")?,
        tips: string_list(obj, "tips")?,
    })
}

fn parse_leftovers(value: &Value) -> Result<LeftoverSuggestion, ParseError> {
    let obj = as_object(value, "leftovers")?;
    let recipes: Vec<BonusRecipe> = array_field(obj, "recipes")?
        .iter()
        .map(|recipe| {
            let recipe = as_object(recipe, "recipe")?;
            Ok(BonusRecipe {
                name: str_field(recipe, "name")?,
                instructions: str_field(recipe, "instructions")?,
            })
        })
        .collect::<Result<_, ParseError>>()?;
    if !(2..=3).contains(&recipes.len()) {
        return Err(ParseError::invalid(
            "recipes",
            format!("expected 2-3 bonus recipes, got {}", recipes.len()),
        ));
    }
    Ok(LeftoverSuggestion {
        meal_name: str_field(obj, "meal_name")?,
        recipes,
    })
}

fn parse_summary(value: &Value) -> Result<MealSummary, ParseError> {
    let obj = as_object(value, "summary")?;
    Ok(MealSummary {
        meal_name: str_field(obj, "meal_name")?,
        overview: str_field(obj, "overview")?,
        tips: string_list(obj, "tips")?,
    })
}
