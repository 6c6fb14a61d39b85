use anyhow::{Context, Result};
use async_trait::async_trait;
use fbr_audit::LogSink;
use fbr_schemas::DistributionLogEntry;
use sqlx::PgPool;

/// Appends entries to `distribution_log`. Each append is its own statement,
/// outside any reconciliation transaction.
#[derive(Debug, Clone)]
pub struct PgLogSink {
    pool: PgPool,
}

impl PgLogSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogSink for PgLogSink {
    async fn append(&self, e: &DistributionLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            insert into distribution_log (
              entry_id, session_id, food_bank_id, kind, ts_utc,
              inventory_item_id, quantity_before, quantity_after, details
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9
            )
            "#,
        )
        .bind(e.entry_id)
        .bind(e.session_id)
        .bind(&e.food_bank_id)
        .bind(e.kind.as_str())
        .bind(e.ts_utc)
        .bind(&e.inventory_item_id)
        .bind(e.quantity_before)
        .bind(e.quantity_after)
        .bind(&e.details)
        .execute(&self.pool)
        .await
        .with_context(|| format!("distribution_log insert failed: {}", e.kind.as_str()))?;
        Ok(())
    }
}
