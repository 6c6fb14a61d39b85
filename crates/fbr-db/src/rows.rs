use fbr_schemas::{DistributionSession, IngredientUsage, InventoryRecord, SessionStatus};
use fbr_store::StoreError;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;

pub(crate) const ITEM_COLUMNS: &str = "item_id, food_bank_id, product_name, brand, barcode, \
     quantity, reserved_quantity, distributed_quantity";

pub(crate) const SESSION_COLUMNS: &str = "session_id, food_bank_id, recipe_id, recipe_name, \
     planned_servings, status, ingredient_usage, initial_meal_count, final_meal_count, \
     distributed_meal_count, has_variance, started_at_utc, completed_at_utc, cancelled_at_utc";

/// Serialization failures and deadlocks are retryable; everything else is
/// backend detail that stays out of caller-facing errors.
pub(crate) fn map_sqlx(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if matches!(db_err.code().as_deref(), Some("40001") | Some("40P01")) {
            return StoreError::Conflict;
        }
    }
    StoreError::Backend(e.to_string())
}

pub(crate) fn item_from_row(row: &PgRow) -> Result<InventoryRecord, StoreError> {
    Ok(InventoryRecord {
        id: row.try_get("item_id").map_err(map_sqlx)?,
        food_bank_id: row.try_get("food_bank_id").map_err(map_sqlx)?,
        product_name: row.try_get("product_name").map_err(map_sqlx)?,
        brand: row.try_get("brand").map_err(map_sqlx)?,
        barcode: row.try_get("barcode").map_err(map_sqlx)?,
        quantity: row.try_get("quantity").map_err(map_sqlx)?,
        reserved_quantity: row.try_get("reserved_quantity").map_err(map_sqlx)?,
        distributed_quantity: row.try_get("distributed_quantity").map_err(map_sqlx)?,
    })
}

pub(crate) fn session_from_row(row: &PgRow) -> Result<DistributionSession, StoreError> {
    let status: String = row.try_get("status").map_err(map_sqlx)?;
    let status = SessionStatus::parse(&status)
        .ok_or_else(|| StoreError::Backend(format!("invalid session status: {status}")))?;
    let Json(ingredient_usage): Json<Vec<IngredientUsage>> =
        row.try_get("ingredient_usage").map_err(map_sqlx)?;

    Ok(DistributionSession {
        id: row.try_get("session_id").map_err(map_sqlx)?,
        food_bank_id: row.try_get("food_bank_id").map_err(map_sqlx)?,
        recipe_id: row.try_get("recipe_id").map_err(map_sqlx)?,
        recipe_name: row.try_get("recipe_name").map_err(map_sqlx)?,
        planned_servings: row.try_get("planned_servings").map_err(map_sqlx)?,
        status,
        ingredient_usage,
        initial_meal_count: row.try_get("initial_meal_count").map_err(map_sqlx)?,
        final_meal_count: row.try_get("final_meal_count").map_err(map_sqlx)?,
        distributed_meal_count: row.try_get("distributed_meal_count").map_err(map_sqlx)?,
        has_variance: row.try_get("has_variance").map_err(map_sqlx)?,
        started_at: row.try_get("started_at_utc").map_err(map_sqlx)?,
        completed_at: row.try_get("completed_at_utc").map_err(map_sqlx)?,
        cancelled_at: row.try_get("cancelled_at_utc").map_err(map_sqlx)?,
    })
}
