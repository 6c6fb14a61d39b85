use fbr_match::available_quantity;
use fbr_reconcile::parse_planned_servings;
use fbr_schemas::{InventoryRecord, ResolvedIngredient};

/// Largest meal count every bound ingredient can cover, scaled to the
/// planned batch: `floor(min(available / estimated) * planned)`.
///
/// Ingredients needing nothing are skipped. A bound item missing from the
/// snapshot counts as zero available. Returns 0 when nothing is bound, in
/// which case the operator enters the count by hand.
pub fn suggest_initial_count(
    resolved: &[ResolvedIngredient],
    inventory: &[InventoryRecord],
    planned_servings: &str,
) -> i64 {
    let planned = parse_planned_servings(planned_servings);

    let mut min_ratio: Option<f64> = None;
    for r in resolved {
        let Some(item_id) = r.inventory_item_id.as_deref() else {
            continue;
        };
        let estimated = r.ingredient.estimated_quantity;
        if !(estimated.is_finite() && estimated > 0.0) {
            continue;
        }
        let available = inventory
            .iter()
            .find(|i| i.id == item_id)
            .map(available_quantity)
            .unwrap_or(0);
        let ratio = available as f64 / estimated;
        min_ratio = Some(min_ratio.map_or(ratio, |m| m.min(ratio)));
    }

    match min_ratio {
        Some(ratio) => (ratio * planned as f64).floor().max(0.0) as i64,
        None => 0,
    }
}
