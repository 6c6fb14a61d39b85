//! fbr-store
//!
//! The single authoritative seam for inventory and session persistence.
//!
//! Every write goes through a [`StoreTx`]; nothing outside a transaction can
//! change `InventoryRecord.quantity`. Backends decide how isolation is
//! achieved (optimistic versions in [`MemoryStore`], `SERIALIZABLE` +
//! row locks in Postgres) but must surface write-write races as
//! [`StoreError::Conflict`] so the caller can retry the whole body.

mod error;
mod memory;
mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use traits::{InventoryStore, StoreTx};
