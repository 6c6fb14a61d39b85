//! A rollback that itself fails does not replace the error that caused it.
//!
//! GREEN when:
//! - an out-of-range final count still returns InvalidRange when the
//!   store's rollback errors, and nothing is committed
//! - the rollback failure is logged, not returned

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use fbr_audit::MemoryLogSink;
use fbr_reconcile::{rollback_logged, DistributionError, Reconciler};
use fbr_schemas::{
    DistributionSession, IngredientUsage, InventoryRecord, RecipeIngredient, ResolvedIngredient, SessionStatus,
};
use fbr_store::{InventoryStore, MemoryStore, StoreError, StoreTx};
use uuid::Uuid;

/// Delegates to [`MemoryStore`] but every rollback reports a backend error.
struct BrokenRollbackStore(MemoryStore);

struct BrokenRollbackTx(Box<dyn StoreTx>);

#[async_trait]
impl InventoryStore for BrokenRollbackStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        Ok(Box::new(BrokenRollbackTx(self.0.begin().await?)))
    }

    async fn inventory_snapshot(&self, food_bank_id: &str) -> Result<Vec<InventoryRecord>, StoreError> {
        self.0.inventory_snapshot(food_bank_id).await
    }

    async fn fetch_session(&self, session_id: Uuid) -> Result<Option<DistributionSession>, StoreError> {
        self.0.fetch_session(session_id).await
    }

    async fn list_sessions(
        &self,
        food_bank_id: &str,
        status: Option<SessionStatus>,
    ) -> Result<Vec<DistributionSession>, StoreError> {
        self.0.list_sessions(food_bank_id, status).await
    }
}

#[async_trait]
impl StoreTx for BrokenRollbackTx {
    async fn load_session(&mut self, session_id: Uuid) -> Result<Option<DistributionSession>, StoreError> {
        self.0.load_session(session_id).await
    }

    async fn active_session_for_recipe(
        &mut self,
        food_bank_id: &str,
        recipe_id: &str,
    ) -> Result<Option<Uuid>, StoreError> {
        self.0.active_session_for_recipe(food_bank_id, recipe_id).await
    }

    async fn insert_session(&mut self, session: &DistributionSession) -> Result<(), StoreError> {
        self.0.insert_session(session).await
    }

    async fn update_session(&mut self, session: &DistributionSession) -> Result<(), StoreError> {
        self.0.update_session(session).await
    }

    async fn load_item(&mut self, item_id: &str) -> Result<Option<InventoryRecord>, StoreError> {
        self.0.load_item(item_id).await
    }

    async fn write_item_stock(
        &mut self,
        item_id: &str,
        quantity: i64,
        distributed_quantity: i64,
    ) -> Result<(), StoreError> {
        self.0.write_item_stock(item_id, quantity, distributed_quantity).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.0.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection reset during rollback".to_string()))
    }
}

async fn setup() -> (MemoryStore, Uuid) {
    let store = MemoryStore::new();
    store.upsert_item(InventoryRecord::new("inv-pasta", "fb-1", "Penne Pasta", 100)).await;

    let mut resolved = ResolvedIngredient::unresolved(RecipeIngredient::new("penne pasta", 10.0, "boxes"));
    resolved.inventory_item_id = Some("inv-pasta".to_string());

    let session = DistributionSession {
        id: Uuid::new_v4(),
        food_bank_id: "fb-1".to_string(),
        recipe_id: "pasta-bake".to_string(),
        recipe_name: "Pasta Bake".to_string(),
        planned_servings: "50".to_string(),
        status: SessionStatus::Active,
        ingredient_usage: vec![IngredientUsage::from_resolved(&resolved)],
        initial_meal_count: 50,
        final_meal_count: None,
        distributed_meal_count: None,
        has_variance: false,
        started_at: Utc::now(),
        completed_at: None,
        cancelled_at: None,
    };
    let mut tx = store.begin().await.unwrap();
    tx.insert_session(&session).await.unwrap();
    tx.commit().await.unwrap();
    (store, session.id)
}

#[tokio::test]
async fn domain_error_survives_failed_rollback() {
    let (store, id) = setup().await;
    let sink = MemoryLogSink::new();
    let writes_before = store.committed_writes().await;

    let err = Reconciler::new(Arc::new(BrokenRollbackStore(store.clone())), Arc::new(sink.clone()))
        .reconcile(id, 60)
        .await
        .unwrap_err();

    assert!(
        matches!(err, DistributionError::InvalidRange { field: "finalMealCount", value: 60, .. }),
        "got {err:?}"
    );
    assert_eq!(store.committed_writes().await, writes_before);
    assert_eq!(store.item("inv-pasta").await.unwrap().quantity, 100);
    let s = store.fetch_session(id).await.unwrap().unwrap();
    assert_eq!(s.status, SessionStatus::Active);
    assert!(sink.entries().await.is_empty());
}

#[tokio::test]
async fn failed_rollback_is_swallowed_after_logging() {
    let (store, _) = setup().await;
    let broken = BrokenRollbackStore(store.clone());
    let mut tx = broken.begin().await.unwrap();
    tx.write_item_stock("inv-pasta", 1, 99).await.unwrap();

    rollback_logged(tx, "test").await;

    assert_eq!(store.item("inv-pasta").await.unwrap().quantity, 100);
}
