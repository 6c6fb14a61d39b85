use fbr_store::{StoreError, StoreTx};

use crate::math::clamp_deduction;

/// What one clamped deduction did to an item's stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockMovement {
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub deducted: i64,
}

/// Remove up to `needed` containers from `item_id` inside `tx`.
///
/// Reads the item fresh through the transaction, clamps to what is on hand,
/// and writes only when something is actually removed. Returns `None` when
/// the item no longer exists; callers treat that as nothing to deduct.
///
/// This is the single write path for lowering stock.
pub async fn apply_clamped_deduction(
    tx: &mut dyn StoreTx,
    item_id: &str,
    needed: i64,
) -> Result<Option<StockMovement>, StoreError> {
    let Some(item) = tx.load_item(item_id).await? else {
        return Ok(None);
    };

    let deducted = clamp_deduction(needed, item.quantity);
    if deducted == 0 {
        return Ok(Some(StockMovement {
            quantity_before: item.quantity,
            quantity_after: item.quantity,
            deducted: 0,
        }));
    }

    let quantity_after = item.quantity - deducted;
    tx.write_item_stock(item_id, quantity_after, item.distributed_quantity + deducted)
        .await?;

    Ok(Some(StockMovement {
        quantity_before: item.quantity,
        quantity_after,
        deducted,
    }))
}
