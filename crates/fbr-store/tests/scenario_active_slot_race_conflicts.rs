//! Two transactions racing to open the same recipe slot.
//!
//! GREEN when:
//! - both see an empty slot, the first commit wins, the second conflicts
//! - after the winner commits, a fresh transaction sees the active session
//! - a slot for another recipe is unaffected

use chrono::Utc;
use fbr_schemas::{DistributionSession, SessionStatus};
use fbr_store::{InventoryStore, MemoryStore, StoreError, StoreTx};
use uuid::Uuid;

fn active(recipe_id: &str) -> DistributionSession {
    DistributionSession {
        id: Uuid::new_v4(),
        food_bank_id: "fb-1".to_string(),
        recipe_id: recipe_id.to_string(),
        recipe_name: "Rice Bowl".to_string(),
        planned_servings: "40 people".to_string(),
        status: SessionStatus::Active,
        ingredient_usage: vec![],
        initial_meal_count: 40,
        final_meal_count: None,
        distributed_meal_count: None,
        has_variance: false,
        started_at: Utc::now(),
        completed_at: None,
        cancelled_at: None,
    }
}

#[tokio::test]
async fn racing_starts_cannot_both_commit() {
    let store = MemoryStore::new();

    let mut t1 = store.begin().await.unwrap();
    let mut t2 = store.begin().await.unwrap();
    assert_eq!(t1.active_session_for_recipe("fb-1", "rice").await.unwrap(), None);
    assert_eq!(t2.active_session_for_recipe("fb-1", "rice").await.unwrap(), None);

    let s1 = active("rice");
    t1.insert_session(&s1).await.unwrap();
    t2.insert_session(&active("rice")).await.unwrap();

    t1.commit().await.unwrap();
    assert_eq!(t2.commit().await.unwrap_err(), StoreError::Conflict);

    let mut t3 = store.begin().await.unwrap();
    assert_eq!(t3.active_session_for_recipe("fb-1", "rice").await.unwrap(), Some(s1.id));
    assert_eq!(t3.active_session_for_recipe("fb-1", "beans").await.unwrap(), None);
    t3.rollback().await.unwrap();

    let listed = store.list_sessions("fb-1", Some(SessionStatus::Active)).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn different_recipes_commit_independently() {
    let store = MemoryStore::new();

    let mut t1 = store.begin().await.unwrap();
    let mut t2 = store.begin().await.unwrap();
    assert_eq!(t1.active_session_for_recipe("fb-1", "rice").await.unwrap(), None);
    assert_eq!(t2.active_session_for_recipe("fb-1", "beans").await.unwrap(), None);
    t1.insert_session(&active("rice")).await.unwrap();
    t2.insert_session(&active("beans")).await.unwrap();

    t1.commit().await.unwrap();
    t2.commit().await.unwrap();
    assert_eq!(store.committed_writes().await, 2);
}
