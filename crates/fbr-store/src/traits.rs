use async_trait::async_trait;
use fbr_schemas::{DistributionSession, InventoryRecord, SessionStatus};
use uuid::Uuid;

use crate::error::StoreError;

/// Transactional inventory + session store.
///
/// Non-transactional reads return committed state and are safe for the
/// resolver and availability checks. Everything else starts with [`begin`].
///
/// [`begin`]: InventoryStore::begin
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    /// Committed inventory for one food bank, in stable (id) order.
    async fn inventory_snapshot(&self, food_bank_id: &str) -> Result<Vec<InventoryRecord>, StoreError>;

    async fn fetch_session(&self, session_id: Uuid) -> Result<Option<DistributionSession>, StoreError>;

    /// Sessions for one food bank, oldest first. `status = None` lists all.
    async fn list_sessions(
        &self,
        food_bank_id: &str,
        status: Option<SessionStatus>,
    ) -> Result<Vec<DistributionSession>, StoreError>;
}

/// One unit of atomic work. Reads see the transaction's own writes.
///
/// Dropping a transaction without calling [`commit`](StoreTx::commit)
/// discards its writes.
#[async_trait]
pub trait StoreTx: Send {
    async fn load_session(&mut self, session_id: Uuid) -> Result<Option<DistributionSession>, StoreError>;

    /// Id of the active session for `(food_bank_id, recipe_id)`, if any.
    async fn active_session_for_recipe(
        &mut self,
        food_bank_id: &str,
        recipe_id: &str,
    ) -> Result<Option<Uuid>, StoreError>;

    async fn insert_session(&mut self, session: &DistributionSession) -> Result<(), StoreError>;

    async fn update_session(&mut self, session: &DistributionSession) -> Result<(), StoreError>;

    async fn load_item(&mut self, item_id: &str) -> Result<Option<InventoryRecord>, StoreError>;

    /// Overwrite an item's stock counters. Only the clamped deduction
    /// primitive in fbr-reconcile calls this.
    ///
    /// `reserved_quantity` is lowered to the new quantity when it would
    /// otherwise exceed it.
    async fn write_item_stock(
        &mut self,
        item_id: &str,
        quantity: i64,
        distributed_quantity: i64,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
