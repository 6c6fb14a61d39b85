//! fbr-testkit
//!
//! Shared fixtures for scenario tests: the pasta-bake recipe payload, a
//! seeded in-memory store, and log sinks that fail on demand.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use fbr_audit::{LogSink, MemoryLogSink};
use fbr_match::{parse_recipe, IngredientRejection};
use fbr_schemas::{DistributionLogEntry, InventoryRecord, LogKind, Recipe};
use fbr_session::{DistributionService, StartOutcome, StartSession};
use fbr_store::MemoryStore;
use serde_json::Value;

pub const FOOD_BANK: &str = "fb-test";
pub const PASTA_ID: &str = "inv-pasta";
pub const SAUCE_ID: &str = "inv-sauce";

/// Generator payload: two good ingredients, one with no inventory match,
/// one with a zero quantity and one with no name.
pub const PASTA_BAKE_JSON: &str = include_str!("../fixtures/pasta_bake.json");

pub fn pasta_bake_payload() -> Result<Value> {
    serde_json::from_str(PASTA_BAKE_JSON).context("parse pasta_bake.json")
}

pub fn pasta_bake_recipe() -> Result<(Recipe, Vec<IngredientRejection>)> {
    let v = pasta_bake_payload()?;
    Ok(parse_recipe(&v)?)
}

/// Pasta and sauce for [`FOOD_BANK`], plus an unrelated item at another bank.
pub fn pantry(pasta_qty: i64, sauce_qty: i64) -> Vec<InventoryRecord> {
    vec![
        InventoryRecord::new(PASTA_ID, FOOD_BANK, "Whole Wheat Pasta", pasta_qty).with_brand("Barilla"),
        InventoryRecord::new(SAUCE_ID, FOOD_BANK, "Tomato Sauce", sauce_qty).with_barcode("0001112223334"),
        InventoryRecord::new("inv-other", "fb-elsewhere", "Whole Wheat Pasta", 500),
    ]
}

pub async fn seeded_store(records: Vec<InventoryRecord>) -> MemoryStore {
    let store = MemoryStore::new();
    for r in records {
        store.upsert_item(r).await;
    }
    store
}

/// Fails every append after the first `healthy` ones.
#[derive(Debug, Default)]
pub struct FailingLogSink {
    healthy: u32,
    seen: AtomicU32,
    inner: MemoryLogSink,
}

impl FailingLogSink {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn after(healthy: u32) -> Self {
        Self {
            healthy,
            ..Self::default()
        }
    }

    /// Entries that were accepted before the sink started failing.
    pub async fn accepted(&self) -> Vec<DistributionLogEntry> {
        self.inner.entries().await
    }
}

#[async_trait]
impl LogSink for FailingLogSink {
    async fn append(&self, entry: &DistributionLogEntry) -> Result<()> {
        let n = self.seen.fetch_add(1, Ordering::SeqCst);
        if n >= self.healthy {
            bail!("log sink unavailable (append #{n})");
        }
        self.inner.append(entry).await
    }
}

/// Store, log and service wired together over an in-memory backend.
pub struct Harness {
    pub store: MemoryStore,
    pub log: MemoryLogSink,
    pub service: DistributionService,
}

impl Harness {
    pub async fn new(records: Vec<InventoryRecord>) -> Self {
        let store = seeded_store(records).await;
        let log = MemoryLogSink::new();
        let service = DistributionService::new(Arc::new(store.clone()), Arc::new(log.clone()));
        Self { store, log, service }
    }

    /// A second service over the same store, writing to `sink` instead.
    pub fn service_with_sink(&self, sink: Arc<dyn LogSink>) -> DistributionService {
        DistributionService::new(Arc::new(self.store.clone()), sink)
            .with_policy(self.service.policy())
    }

    /// Validate, resolve and start the pasta-bake recipe.
    pub async fn start_pasta(&self, recipe_id: &str, initial_meal_count: i64) -> Result<StartOutcome> {
        start_pasta_with(&self.service, recipe_id, initial_meal_count).await
    }

    pub async fn quantity(&self, item_id: &str) -> Option<i64> {
        self.store.item(item_id).await.map(|i| i.quantity)
    }

    pub async fn log_kinds(&self) -> Vec<LogKind> {
        self.log.entries().await.iter().map(|e| e.kind).collect()
    }
}

pub async fn start_pasta_with(
    service: &DistributionService,
    recipe_id: &str,
    initial_meal_count: i64,
) -> Result<StartOutcome> {
    let (recipe, _rejected) = pasta_bake_recipe()?;
    let resolved = service.resolve(FOOD_BANK, &recipe.ingredients).await?;
    let out = service
        .start(StartSession {
            food_bank_id: FOOD_BANK.to_string(),
            recipe_id: recipe_id.to_string(),
            recipe_name: recipe.name,
            planned_servings: recipe.servings,
            initial_meal_count,
            ingredients: resolved,
        })
        .await?;
    Ok(out)
}
