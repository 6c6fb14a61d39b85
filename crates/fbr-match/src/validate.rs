//! Shape validation for recipe payloads coming from the recipe generator.
//!
//! The generator is an untrusted producer. Malformed ingredient entries are
//! rejected one at a time so a single bad line does not sink the batch.

use fbr_schemas::{Recipe, RecipeIngredient};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why one ingredient entry was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientRejection {
    /// Position in the generator's ingredient array.
    pub index: usize,
    pub field: String,
    pub reason: String,
}

impl IngredientRejection {
    fn new(index: usize, field: &str, reason: impl Into<String>) -> Self {
        Self {
            index,
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for IngredientRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ingredient[{}].{}: {}", self.index, self.field, self.reason)
    }
}

/// The recipe envelope itself is unusable (not the individual ingredients).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeShapeError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl std::fmt::Display for RecipeShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid recipe: {} {}", self.field, self.reason)
    }
}

impl std::error::Error for RecipeShapeError {}

/// Validate raw ingredient entries. Returns accepted ingredients in input
/// order plus one rejection per dropped entry.
pub fn validate_ingredients(raw: &[Value]) -> (Vec<RecipeIngredient>, Vec<IngredientRejection>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for (i, entry) in raw.iter().enumerate() {
        match validate_one(i, entry) {
            Ok(ing) => accepted.push(ing),
            Err(r) => rejected.push(r),
        }
    }

    (accepted, rejected)
}

fn validate_one(index: usize, entry: &Value) -> Result<RecipeIngredient, IngredientRejection> {
    let obj = entry
        .as_object()
        .ok_or_else(|| IngredientRejection::new(index, "entry", "must be an object"))?;

    let product_name = obj
        .get("productName")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| IngredientRejection::new(index, "productName", "missing or blank"))?;

    let estimated_quantity = match obj.get("estimatedQuantity") {
        Some(Value::Number(n)) => n.as_f64(),
        // Generators occasionally quote numbers.
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| IngredientRejection::new(index, "estimatedQuantity", "missing or not numeric"))?;

    if !estimated_quantity.is_finite() || estimated_quantity <= 0.0 {
        return Err(IngredientRejection::new(
            index,
            "estimatedQuantity",
            format!("must be positive, got {estimated_quantity}"),
        ));
    }

    let unit = obj
        .get("unit")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| IngredientRejection::new(index, "unit", "missing or blank"))?;

    let total_amount = obj
        .get("totalAmount")
        .and_then(Value::as_str)
        .map(|s| s.to_string());

    Ok(RecipeIngredient {
        product_name: product_name.to_string(),
        estimated_quantity,
        unit: unit.to_string(),
        total_amount,
    })
}

/// Parse a generator recipe object. Missing `name` or `ingredients` fails the
/// whole recipe; bad ingredient lines are dropped and reported. A missing
/// `servings` string becomes `""`, which later degrades to a batch of 1.
pub fn parse_recipe(v: &Value) -> Result<(Recipe, Vec<IngredientRejection>), RecipeShapeError> {
    let name = v
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(RecipeShapeError {
            field: "name",
            reason: "is missing or blank",
        })?;

    let raw_ingredients = v
        .get("ingredients")
        .and_then(Value::as_array)
        .ok_or(RecipeShapeError {
            field: "ingredients",
            reason: "must be an array",
        })?;

    let servings = match v.get("servings") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    let id = v.get("id").and_then(Value::as_str).map(|s| s.to_string());

    let (ingredients, rejected) = validate_ingredients(raw_ingredients);

    Ok((
        Recipe {
            id,
            name: name.to_string(),
            servings,
            ingredients,
        },
        rejected,
    ))
}
