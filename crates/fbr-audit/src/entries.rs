//! Builders for the four distribution log entry kinds.

use chrono::{DateTime, Utc};
use fbr_schemas::{Deduction, DistributionLogEntry, DistributionSession, LogKind};
use serde_json::json;
use uuid::Uuid;

fn base(session: &DistributionSession, kind: LogKind, ts_utc: DateTime<Utc>) -> DistributionLogEntry {
    DistributionLogEntry {
        entry_id: Uuid::new_v4(),
        session_id: session.id,
        food_bank_id: session.food_bank_id.clone(),
        kind,
        ts_utc,
        inventory_item_id: None,
        quantity_before: None,
        quantity_after: None,
        details: json!({}),
    }
}

pub fn session_started(session: &DistributionSession, ts_utc: DateTime<Utc>) -> DistributionLogEntry {
    let bound = session
        .ingredient_usage
        .iter()
        .filter(|u| u.inventory_item_id.is_some())
        .count();
    let mut e = base(session, LogKind::SessionStarted, ts_utc);
    e.details = json!({
        "recipeId": session.recipe_id,
        "recipeName": session.recipe_name,
        "plannedServings": session.planned_servings,
        "initialMealCount": session.initial_meal_count,
        "ingredientCount": session.ingredient_usage.len(),
        "boundIngredientCount": bound,
    });
    e
}

pub fn inventory_deducted(
    session: &DistributionSession,
    deduction: &Deduction,
    ts_utc: DateTime<Utc>,
) -> DistributionLogEntry {
    let mut e = base(session, LogKind::InventoryDeducted, ts_utc);
    e.inventory_item_id = Some(deduction.inventory_item_id.clone());
    e.quantity_before = Some(deduction.quantity_before);
    e.quantity_after = Some(deduction.quantity_after);
    e.details = json!({
        "productName": deduction.product_name,
        "needed": deduction.needed,
        "deducted": deduction.deducted,
        "variance": deduction.variance,
    });
    e
}

pub fn counting_completed(
    session: &DistributionSession,
    deductions: &[Deduction],
    ts_utc: DateTime<Utc>,
) -> DistributionLogEntry {
    let mut e = base(session, LogKind::CountingCompleted, ts_utc);
    e.details = json!({
        "initialMealCount": session.initial_meal_count,
        "finalMealCount": session.final_meal_count,
        "distributedMealCount": session.distributed_meal_count,
        "itemsDeducted": deductions.len(),
        "hasVariance": session.has_variance,
    });
    e
}

pub fn session_cancelled(session: &DistributionSession, ts_utc: DateTime<Utc>) -> DistributionLogEntry {
    let mut e = base(session, LogKind::SessionCancelled, ts_utc);
    e.details = json!({
        "recipeId": session.recipe_id,
        "initialMealCount": session.initial_meal_count,
    });
    e
}
