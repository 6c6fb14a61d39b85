//! Shared data model for the distribution reconciliation engine.
//!
//! Recipe-facing types use camelCase on the wire because they arrive from the
//! recipe generator as JSON. Session and log types are owned by this system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// One stocked product line. Quantities are counted in containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub id: String,
    pub food_bank_id: String,
    pub product_name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    pub quantity: i64,
    #[serde(default)]
    pub reserved_quantity: i64,
    #[serde(default)]
    pub distributed_quantity: i64,
}

impl InventoryRecord {
    pub fn new(
        id: impl Into<String>,
        food_bank_id: impl Into<String>,
        product_name: impl Into<String>,
        quantity: i64,
    ) -> Self {
        Self {
            id: id.into(),
            food_bank_id: food_bank_id.into(),
            product_name: product_name.into(),
            brand: None,
            barcode: None,
            quantity,
            reserved_quantity: 0,
            distributed_quantity: 0,
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    pub fn with_reserved(mut self, reserved: i64) -> Self {
        self.reserved_quantity = reserved;
        self
    }
}

// ---------------------------------------------------------------------------
// Recipes
// ---------------------------------------------------------------------------

/// Ingredient line as produced by the recipe generator. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeIngredient {
    pub product_name: String,
    /// Containers needed for one full recipe batch.
    pub estimated_quantity: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<String>,
}

impl RecipeIngredient {
    pub fn new(product_name: impl Into<String>, estimated_quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            estimated_quantity,
            unit: unit.into(),
            total_amount: None,
        }
    }
}

/// A validated recipe. `servings` keeps the generator's display string
/// (e.g. "200 people"); the planned batch is parsed from it on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub servings: String,
    pub ingredients: Vec<RecipeIngredient>,
}

/// A recipe ingredient bound (or not) to one inventory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedIngredient {
    #[serde(flatten)]
    pub ingredient: RecipeIngredient,
    #[serde(default)]
    pub inventory_item_id: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    /// Combined name + brand score of the accepted match.
    #[serde(default)]
    pub match_score: Option<f64>,
}

impl ResolvedIngredient {
    pub fn unresolved(ingredient: RecipeIngredient) -> Self {
        Self {
            ingredient,
            inventory_item_id: None,
            barcode: None,
            match_score: None,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.inventory_item_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            "cancelled" => Some(SessionStatus::Cancelled),
            _ => None,
        }
    }

    /// Completed and cancelled sessions never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-ingredient consumption record carried inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientUsage {
    pub product_name: String,
    #[serde(default)]
    pub inventory_item_id: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    pub expected_quantity: f64,
    pub expected_unit: String,
    #[serde(default)]
    pub total_amount: Option<String>,
    /// Containers the distribution should have consumed; set at completion.
    #[serde(default)]
    pub actual_quantity: Option<i64>,
    /// Containers actually removed from stock.
    #[serde(default)]
    pub deducted_quantity: i64,
    #[serde(default)]
    pub deducted_from_inventory: bool,
    #[serde(default)]
    pub deducted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub variance: i64,
    #[serde(default)]
    pub variance_percentage: f64,
}

impl IngredientUsage {
    /// Snapshot a resolved ingredient at session start. The expected quantity
    /// is the recipe's full-batch estimate; scaling happens at completion.
    pub fn from_resolved(resolved: &ResolvedIngredient) -> Self {
        Self {
            product_name: resolved.ingredient.product_name.clone(),
            inventory_item_id: resolved.inventory_item_id.clone(),
            barcode: resolved.barcode.clone(),
            expected_quantity: resolved.ingredient.estimated_quantity,
            expected_unit: resolved.ingredient.unit.clone(),
            total_amount: resolved.ingredient.total_amount.clone(),
            actual_quantity: None,
            deducted_quantity: 0,
            deducted_from_inventory: false,
            deducted_at: None,
            variance: 0,
            variance_percentage: 0.0,
        }
    }
}

/// One distribution attempt for a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionSession {
    pub id: Uuid,
    pub food_bank_id: String,
    pub recipe_id: String,
    pub recipe_name: String,
    /// Display string the recipe was planned for, e.g. "200 people".
    pub planned_servings: String,
    pub status: SessionStatus,
    pub ingredient_usage: Vec<IngredientUsage>,
    pub initial_meal_count: i64,
    #[serde(default)]
    pub final_meal_count: Option<i64>,
    #[serde(default)]
    pub distributed_meal_count: Option<i64>,
    #[serde(default)]
    pub has_variance: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl DistributionSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// A single applied (or attempted) stock deduction, reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deduction {
    pub inventory_item_id: String,
    pub product_name: String,
    pub needed: i64,
    pub deducted: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub variance: i64,
}

// ---------------------------------------------------------------------------
// Distribution log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    SessionStarted,
    CountingCompleted,
    InventoryDeducted,
    SessionCancelled,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::SessionStarted => "session_started",
            LogKind::CountingCompleted => "counting_completed",
            LogKind::InventoryDeducted => "inventory_deducted",
            LogKind::SessionCancelled => "session_cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "session_started" => Some(LogKind::SessionStarted),
            "counting_completed" => Some(LogKind::CountingCompleted),
            "inventory_deducted" => Some(LogKind::InventoryDeducted),
            "session_cancelled" => Some(LogKind::SessionCancelled),
            _ => None,
        }
    }
}

/// Append-only log record. Never mutated or deleted once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionLogEntry {
    pub entry_id: Uuid,
    pub session_id: Uuid,
    pub food_bank_id: String,
    pub kind: LogKind,
    pub ts_utc: DateTime<Utc>,
    #[serde(default)]
    pub inventory_item_id: Option<String>,
    #[serde(default)]
    pub quantity_before: Option<i64>,
    #[serde(default)]
    pub quantity_after: Option<i64>,
    pub details: Value,
}
