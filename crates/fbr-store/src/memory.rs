//! In-process store with optimistic concurrency.
//!
//! Each record carries a version. A transaction remembers the version of
//! everything it read and buffers its writes; `commit` re-checks those
//! versions under the lock and fails with [`StoreError::Conflict`] if any
//! moved. Reads of the per-recipe "active session" slot are versioned too,
//! so two racing `start`s cannot both see an empty slot and commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use fbr_schemas::{DistributionSession, InventoryRecord, SessionStatus};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::traits::{InventoryStore, StoreTx};

#[derive(Debug, Clone)]
struct Versioned<T> {
    value: T,
    version: u64,
}

#[derive(Debug, Default)]
struct State {
    items: BTreeMap<String, Versioned<InventoryRecord>>,
    sessions: BTreeMap<Uuid, Versioned<DistributionSession>>,
    /// Version of each (food_bank, recipe) active-session slot.
    recipe_slots: HashMap<String, u64>,
    /// Test hook: fail this many upcoming commits with `Conflict`.
    injected_conflicts: u32,
    committed_writes: u64,
}

impl State {
    fn item_version(&self, id: &str) -> u64 {
        self.items.get(id).map(|v| v.version).unwrap_or(0)
    }

    fn session_version(&self, id: &Uuid) -> u64 {
        self.sessions.get(id).map(|v| v.version).unwrap_or(0)
    }

    fn slot_version(&self, key: &str) -> u64 {
        self.recipe_slots.get(key).copied().unwrap_or(0)
    }
}

fn slot_key(food_bank_id: &str, recipe_id: &str) -> String {
    format!("{food_bank_id}\u{1f}{recipe_id}")
}

/// Shared handle; clones point at the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stock intake. Replaces any record with the same id.
    pub async fn upsert_item(&self, record: InventoryRecord) {
        let mut st = self.state.lock().await;
        let version = st.item_version(&record.id) + 1;
        st.items.insert(record.id.clone(), Versioned { value: record, version });
    }

    pub async fn item(&self, id: &str) -> Option<InventoryRecord> {
        self.state.lock().await.items.get(id).map(|v| v.value.clone())
    }

    /// Remove an item outright (simulates a record deleted between setup and
    /// reconciliation).
    pub async fn remove_item(&self, id: &str) {
        self.state.lock().await.items.remove(id);
    }

    /// Make the next `n` commits fail with [`StoreError::Conflict`].
    pub async fn inject_commit_conflicts(&self, n: u32) {
        self.state.lock().await.injected_conflicts = n;
    }

    /// Number of commits that applied at least one write.
    pub async fn committed_writes(&self) -> u64 {
        self.state.lock().await.committed_writes
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        Ok(Box::new(MemoryTx {
            state: Arc::clone(&self.state),
            item_reads: HashMap::new(),
            session_reads: HashMap::new(),
            slot_reads: HashMap::new(),
            item_writes: BTreeMap::new(),
            session_writes: BTreeMap::new(),
        }))
    }

    async fn inventory_snapshot(&self, food_bank_id: &str) -> Result<Vec<InventoryRecord>, StoreError> {
        let st = self.state.lock().await;
        Ok(st
            .items
            .values()
            .filter(|v| v.value.food_bank_id == food_bank_id)
            .map(|v| v.value.clone())
            .collect())
    }

    async fn fetch_session(&self, session_id: Uuid) -> Result<Option<DistributionSession>, StoreError> {
        let st = self.state.lock().await;
        Ok(st.sessions.get(&session_id).map(|v| v.value.clone()))
    }

    async fn list_sessions(
        &self,
        food_bank_id: &str,
        status: Option<SessionStatus>,
    ) -> Result<Vec<DistributionSession>, StoreError> {
        let st = self.state.lock().await;
        let mut out: Vec<DistributionSession> = st
            .sessions
            .values()
            .map(|v| &v.value)
            .filter(|s| s.food_bank_id == food_bank_id)
            .filter(|s| status.map_or(true, |want| s.status == want))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }
}

struct MemoryTx {
    state: Arc<Mutex<State>>,
    item_reads: HashMap<String, u64>,
    session_reads: HashMap<Uuid, u64>,
    slot_reads: HashMap<String, u64>,
    item_writes: BTreeMap<String, InventoryRecord>,
    session_writes: BTreeMap<Uuid, DistributionSession>,
}

impl MemoryTx {
    fn has_writes(&self) -> bool {
        !self.item_writes.is_empty() || !self.session_writes.is_empty()
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn load_session(&mut self, session_id: Uuid) -> Result<Option<DistributionSession>, StoreError> {
        if let Some(s) = self.session_writes.get(&session_id) {
            return Ok(Some(s.clone()));
        }
        let st = self.state.lock().await;
        self.session_reads
            .entry(session_id)
            .or_insert_with(|| st.session_version(&session_id));
        Ok(st.sessions.get(&session_id).map(|v| v.value.clone()))
    }

    async fn active_session_for_recipe(
        &mut self,
        food_bank_id: &str,
        recipe_id: &str,
    ) -> Result<Option<Uuid>, StoreError> {
        let key = slot_key(food_bank_id, recipe_id);
        let st = self.state.lock().await;
        self.slot_reads
            .entry(key.clone())
            .or_insert_with(|| st.slot_version(&key));

        let matches = |s: &DistributionSession| {
            s.food_bank_id == food_bank_id && s.recipe_id == recipe_id && s.is_active()
        };

        // Own writes shadow committed rows.
        if let Some(s) = self.session_writes.values().find(|s| matches(s)) {
            return Ok(Some(s.id));
        }
        Ok(st
            .sessions
            .values()
            .filter(|v| !self.session_writes.contains_key(&v.value.id))
            .find(|v| matches(&v.value))
            .map(|v| v.value.id))
    }

    async fn insert_session(&mut self, session: &DistributionSession) -> Result<(), StoreError> {
        let exists = self.session_writes.contains_key(&session.id)
            || self.state.lock().await.sessions.contains_key(&session.id);
        if exists {
            return Err(StoreError::Backend(format!("duplicate session id {}", session.id)));
        }
        self.session_reads.insert(session.id, 0);
        self.session_writes.insert(session.id, session.clone());
        Ok(())
    }

    async fn update_session(&mut self, session: &DistributionSession) -> Result<(), StoreError> {
        if !self.session_writes.contains_key(&session.id) {
            let st = self.state.lock().await;
            if !st.sessions.contains_key(&session.id) {
                return Err(StoreError::NotFound {
                    entity: "session",
                    id: session.id.to_string(),
                });
            }
            self.session_reads
                .entry(session.id)
                .or_insert_with(|| st.session_version(&session.id));
        }
        self.session_writes.insert(session.id, session.clone());
        Ok(())
    }

    async fn load_item(&mut self, item_id: &str) -> Result<Option<InventoryRecord>, StoreError> {
        if let Some(item) = self.item_writes.get(item_id) {
            return Ok(Some(item.clone()));
        }
        let st = self.state.lock().await;
        self.item_reads
            .entry(item_id.to_string())
            .or_insert_with(|| st.item_version(item_id));
        Ok(st.items.get(item_id).map(|v| v.value.clone()))
    }

    async fn write_item_stock(
        &mut self,
        item_id: &str,
        quantity: i64,
        distributed_quantity: i64,
    ) -> Result<(), StoreError> {
        let mut record = match self.item_writes.get(item_id) {
            Some(r) => r.clone(),
            None => {
                let st = self.state.lock().await;
                let r = st.items.get(item_id).ok_or_else(|| StoreError::NotFound {
                    entity: "inventory item",
                    id: item_id.to_string(),
                })?;
                self.item_reads
                    .entry(item_id.to_string())
                    .or_insert(r.version);
                r.value.clone()
            }
        };
        if quantity < 0 {
            return Err(StoreError::Backend(format!(
                "quantity for {item_id} would become negative ({quantity})"
            )));
        }
        record.quantity = quantity;
        record.reserved_quantity = record.reserved_quantity.min(quantity);
        record.distributed_quantity = distributed_quantity;
        self.item_writes.insert(item_id.to_string(), record);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let has_writes = self.has_writes();
        let MemoryTx {
            state,
            item_reads,
            session_reads,
            slot_reads,
            item_writes,
            session_writes,
        } = *self;
        let mut st = state.lock().await;

        if st.injected_conflicts > 0 {
            st.injected_conflicts -= 1;
            debug!("memory store: injected commit conflict");
            return Err(StoreError::Conflict);
        }

        let stale = item_reads.iter().any(|(id, v)| st.item_version(id) != *v)
            || session_reads.iter().any(|(id, v)| st.session_version(id) != *v)
            || slot_reads.iter().any(|(k, v)| st.slot_version(k) != *v);
        if stale {
            debug!("memory store: read set changed since begin; conflict");
            return Err(StoreError::Conflict);
        }

        if !has_writes {
            return Ok(());
        }

        for (id, record) in item_writes {
            let version = st.item_version(&id) + 1;
            st.items.insert(id, Versioned { value: record, version });
        }

        for (id, session) in session_writes {
            let key = slot_key(&session.food_bank_id, &session.recipe_id);
            let slot = st.slot_version(&key) + 1;
            st.recipe_slots.insert(key, slot);

            let version = st.session_version(&id) + 1;
            st.sessions.insert(id, Versioned { value: session, version });
        }

        st.committed_writes += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let store = MemoryStore::new();
        store.upsert_item(InventoryRecord::new("a", "fb", "Rice", 10)).await;

        let mut tx = store.begin().await.unwrap();
        tx.write_item_stock("a", 4, 6).await.unwrap();
        assert_eq!(tx.load_item("a").await.unwrap().unwrap().quantity, 4);
        drop(tx);

        assert_eq!(store.item("a").await.unwrap().quantity, 10);
        assert_eq!(store.committed_writes().await, 0);
    }

    #[tokio::test]
    async fn second_writer_on_same_item_conflicts() {
        let store = MemoryStore::new();
        store.upsert_item(InventoryRecord::new("a", "fb", "Rice", 10)).await;

        let mut t1 = store.begin().await.unwrap();
        let mut t2 = store.begin().await.unwrap();
        let q1 = t1.load_item("a").await.unwrap().unwrap().quantity;
        let q2 = t2.load_item("a").await.unwrap().unwrap().quantity;
        t1.write_item_stock("a", q1 - 3, 3).await.unwrap();
        t2.write_item_stock("a", q2 - 5, 5).await.unwrap();

        t1.commit().await.unwrap();
        assert_eq!(t2.commit().await.unwrap_err(), StoreError::Conflict);
        assert_eq!(store.item("a").await.unwrap().quantity, 7);
    }

    #[tokio::test]
    async fn negative_quantity_write_is_refused() {
        let store = MemoryStore::new();
        store.upsert_item(InventoryRecord::new("a", "fb", "Rice", 1)).await;
        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.write_item_stock("a", -1, 2).await,
            Err(StoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn reservation_never_exceeds_stock_after_write() {
        let store = MemoryStore::new();
        store
            .upsert_item(InventoryRecord::new("a", "fb", "Rice", 10).with_reserved(8))
            .await;
        let mut tx = store.begin().await.unwrap();
        tx.write_item_stock("a", 3, 7).await.unwrap();
        tx.commit().await.unwrap();

        let item = store.item("a").await.unwrap();
        assert_eq!((item.quantity, item.reserved_quantity), (3, 3));
    }

    #[tokio::test]
    async fn injected_conflicts_are_consumed_in_order() {
        let store = MemoryStore::new();
        store.inject_commit_conflicts(1).await;
        let tx = store.begin().await.unwrap();
        assert!(tx.commit().await.unwrap_err().is_conflict());
        let tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();
    }
}
