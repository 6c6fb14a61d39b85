//! fbr-db
//!
//! Postgres backing for the distribution engine.
//!
//! - [`PgStore`] implements [`fbr_store::InventoryStore`]: every transaction
//!   runs `SERIALIZABLE` and locks the rows it reads with `FOR UPDATE`, so two
//!   sessions deducting the same item serialize instead of losing an update.
//! - [`PgLogSink`] appends to the `distribution_log` table (a trigger rejects
//!   updates and deletes).

use anyhow::{Context, Result};
use fbr_schemas::InventoryRecord;
use sqlx::{postgres::PgPoolOptions, PgPool};

mod rows;
mod sink;
mod store;

pub use sink::PgLogSink;
pub use store::PgStore;

pub const ENV_DB_URL: &str = "FBR_DATABASE_URL";

/// Connect to Postgres using FBR_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_sessions_table: bool,
}

/// Connectivity plus schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='distribution_sessions'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_sessions_table: exists,
    })
}

/// Stock intake: insert or replace an inventory record.
///
/// Outside the reconciliation path; used for seeding and external intake only.
pub async fn upsert_inventory_item(pool: &PgPool, item: &InventoryRecord) -> Result<()> {
    sqlx::query(
        r#"
        insert into inventory_items (
          item_id, food_bank_id, product_name, brand, barcode,
          quantity, reserved_quantity, distributed_quantity
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8
        )
        on conflict (item_id) do update set
          food_bank_id = excluded.food_bank_id,
          product_name = excluded.product_name,
          brand = excluded.brand,
          barcode = excluded.barcode,
          quantity = excluded.quantity,
          reserved_quantity = excluded.reserved_quantity,
          distributed_quantity = excluded.distributed_quantity,
          updated_at_utc = now()
        "#,
    )
    .bind(&item.id)
    .bind(&item.food_bank_id)
    .bind(&item.product_name)
    .bind(&item.brand)
    .bind(&item.barcode)
    .bind(item.quantity)
    .bind(item.reserved_quantity)
    .bind(item.distributed_quantity)
    .execute(pool)
    .await
    .with_context(|| format!("upsert_inventory_item failed: {}", item.id))?;
    Ok(())
}
