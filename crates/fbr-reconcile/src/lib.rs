//! fbr-reconcile
//!
//! Converts an observed "meals served" count into inventory deductions.
//!
//! - [`math`]: pure need / clamp / variance arithmetic.
//! - [`apply_clamped_deduction`]: the only code path that lowers stock.
//! - [`Reconciler`]: runs the whole completion as one store transaction,
//!   retrying on conflict with fresh reads every attempt, then writes the
//!   log entries outside the atomic boundary.
//!
//! Numeric policy: need rounds up, application clamps down. Stock never
//! goes negative; shortfall is recorded as variance instead.

mod deduct;
mod engine;
mod error;
pub mod math;

pub use deduct::{apply_clamped_deduction, StockMovement};
pub use engine::{rollback_logged, ReconcileOutcome, Reconciler, DEFAULT_MAX_ATTEMPTS};
pub use error::DistributionError;
pub use math::parse_planned_servings;
