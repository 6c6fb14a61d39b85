use async_trait::async_trait;
use fbr_schemas::{DistributionSession, InventoryRecord, SessionStatus};
use fbr_store::{InventoryStore, StoreError, StoreTx};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::rows::{item_from_row, map_sqlx, session_from_row, ITEM_COLUMNS, SESSION_COLUMNS};

/// Postgres-backed [`InventoryStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        sqlx::query("set transaction isolation level serializable")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn inventory_snapshot(&self, food_bank_id: &str) -> Result<Vec<InventoryRecord>, StoreError> {
        let sql = format!("select {ITEM_COLUMNS} from inventory_items where food_bank_id = $1 order by item_id");
        let rows = sqlx::query(&sql)
            .bind(food_bank_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(item_from_row).collect()
    }

    async fn fetch_session(&self, session_id: Uuid) -> Result<Option<DistributionSession>, StoreError> {
        let sql = format!("select {SESSION_COLUMNS} from distribution_sessions where session_id = $1");
        let row = sqlx::query(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn list_sessions(
        &self,
        food_bank_id: &str,
        status: Option<SessionStatus>,
    ) -> Result<Vec<DistributionSession>, StoreError> {
        let sql = format!(
            "select {SESSION_COLUMNS} from distribution_sessions \
             where food_bank_id = $1 and ($2::text is null or status = $2) \
             order by started_at_utc, session_id"
        );
        let rows = sqlx::query(&sql)
            .bind(food_bank_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(session_from_row).collect()
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn load_session(&mut self, session_id: Uuid) -> Result<Option<DistributionSession>, StoreError> {
        let sql = format!("select {SESSION_COLUMNS} from distribution_sessions where session_id = $1 for update");
        let row = sqlx::query(&sql)
            .bind(session_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn active_session_for_recipe(
        &mut self,
        food_bank_id: &str,
        recipe_id: &str,
    ) -> Result<Option<Uuid>, StoreError> {
        // The serializable read here makes a concurrent start for the same
        // recipe fail with 40001 instead of slipping past the check.
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            select session_id
            from distribution_sessions
            where food_bank_id = $1 and recipe_id = $2 and status = 'active'
            order by started_at_utc
            limit 1
            "#,
        )
        .bind(food_bank_id)
        .bind(recipe_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(|(id,)| id))
    }

    async fn insert_session(&mut self, s: &DistributionSession) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            insert into distribution_sessions (
              session_id, food_bank_id, recipe_id, recipe_name, planned_servings,
              status, ingredient_usage, initial_meal_count, final_meal_count,
              distributed_meal_count, has_variance, started_at_utc,
              completed_at_utc, cancelled_at_utc
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14
            )
            "#,
        )
        .bind(s.id)
        .bind(&s.food_bank_id)
        .bind(&s.recipe_id)
        .bind(&s.recipe_name)
        .bind(&s.planned_servings)
        .bind(s.status.as_str())
        .bind(Json(&s.ingredient_usage))
        .bind(s.initial_meal_count)
        .bind(s.final_meal_count)
        .bind(s.distributed_meal_count)
        .bind(s.has_variance)
        .bind(s.started_at)
        .bind(s.completed_at)
        .bind(s.cancelled_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update_session(&mut self, s: &DistributionSession) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            update distribution_sessions
            set status = $2,
                ingredient_usage = $3,
                final_meal_count = $4,
                distributed_meal_count = $5,
                has_variance = $6,
                completed_at_utc = $7,
                cancelled_at_utc = $8
            where session_id = $1
            "#,
        )
        .bind(s.id)
        .bind(s.status.as_str())
        .bind(Json(&s.ingredient_usage))
        .bind(s.final_meal_count)
        .bind(s.distributed_meal_count)
        .bind(s.has_variance)
        .bind(s.completed_at)
        .bind(s.cancelled_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "session",
                id: s.id.to_string(),
            });
        }
        Ok(())
    }

    async fn load_item(&mut self, item_id: &str) -> Result<Option<InventoryRecord>, StoreError> {
        let sql = format!("select {ITEM_COLUMNS} from inventory_items where item_id = $1 for update");
        let row = sqlx::query(&sql)
            .bind(item_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn write_item_stock(
        &mut self,
        item_id: &str,
        quantity: i64,
        distributed_quantity: i64,
    ) -> Result<(), StoreError> {
        if quantity < 0 {
            return Err(StoreError::Backend(format!(
                "quantity for {item_id} would become negative ({quantity})"
            )));
        }
        let res = sqlx::query(
            r#"
            update inventory_items
            set quantity = $2,
                reserved_quantity = least(reserved_quantity, $2),
                distributed_quantity = $3,
                updated_at_utc = now()
            where item_id = $1
            "#,
        )
        .bind(item_id)
        .bind(quantity)
        .bind(distributed_quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "inventory item",
                id: item_id.to_string(),
            });
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgTx { tx } = *self;
        tx.commit().await.map_err(|e| {
            let mapped = map_sqlx(e);
            if mapped.is_conflict() {
                debug!("postgres: serialization failure at commit");
            }
            mapped
        })
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let PgTx { tx } = *self;
        tx.rollback().await.map_err(map_sqlx)
    }
}
