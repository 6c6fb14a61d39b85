use std::sync::Arc;

use chrono::{DateTime, Utc};
use fbr_audit::{entries, LogSink};
use fbr_schemas::{Deduction, DistributionSession, SessionStatus};
use fbr_store::{InventoryStore, StoreError, StoreTx};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::deduct::apply_clamped_deduction;
use crate::error::DistributionError;
use crate::math::{actual_quantity_needed, parse_planned_servings, usage_ratio, variance_percentage};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Result of a committed reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    /// The session as committed (status `completed`).
    pub session: DistributionSession,
    /// One entry per item whose stock actually went down.
    pub deductions: Vec<Deduction>,
    pub has_variance: bool,
    pub usage_ratio: f64,
    /// Transaction attempts used, including the successful one.
    pub attempts: u32,
    /// Non-fatal problems: vanished inventory records, failed log writes.
    pub warnings: Vec<String>,
}

enum AttemptError {
    Store(StoreError),
    Domain(DistributionError),
}

impl From<StoreError> for AttemptError {
    fn from(e: StoreError) -> Self {
        AttemptError::Store(e)
    }
}

impl From<DistributionError> for AttemptError {
    fn from(e: DistributionError) -> Self {
        AttemptError::Domain(e)
    }
}

struct AttemptResult {
    session: DistributionSession,
    deductions: Vec<Deduction>,
    usage_ratio: f64,
    warnings: Vec<String>,
    completed_at: DateTime<Utc>,
}

/// Log the backend detail, hand the caller only the operation name.
pub(crate) fn storage_error(operation: &'static str, e: StoreError) -> DistributionError {
    error!(operation, error = %e, "store operation failed");
    DistributionError::Storage { operation }
}

/// Roll back after a failed attempt. The attempt's own error is what the
/// caller sees; a rollback failure is only logged.
pub async fn rollback_logged(tx: Box<dyn StoreTx>, operation: &'static str) {
    if let Err(e) = tx.rollback().await {
        warn!(operation, error = %e, "rollback failed");
    }
}

/// Runs the completion of a session as one atomic store transaction.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn InventoryStore>,
    sink: Arc<dyn LogSink>,
    max_attempts: u32,
}

impl Reconciler {
    pub fn new(store: Arc<dyn InventoryStore>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            store,
            sink,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// At least one attempt is always made.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Complete `session_id` with `final_meal_count` meals left over.
    ///
    /// The session row and every stock write commit together or not at all.
    /// On [`StoreError::Conflict`] the whole body is re-run from fresh reads,
    /// up to `max_attempts` times.
    pub async fn reconcile(
        &self,
        session_id: Uuid,
        final_meal_count: i64,
    ) -> Result<ReconcileOutcome, DistributionError> {
        let mut attempt = 0u32;

        while attempt < self.max_attempts {
            attempt += 1;

            let mut tx = match self.store.begin().await {
                Ok(tx) => tx,
                Err(StoreError::Conflict) => {
                    warn!(%session_id, attempt, "begin conflicted; retrying");
                    continue;
                }
                Err(e) => return Err(storage_error("begin reconciliation", e)),
            };

            let body = run_attempt(tx.as_mut(), session_id, final_meal_count, Utc::now()).await;

            let done = match body {
                Ok(done) => done,
                Err(AttemptError::Store(StoreError::Conflict)) => {
                    rollback_logged(tx, "reconcile").await;
                    warn!(%session_id, attempt, "reconciliation read conflicted; retrying");
                    continue;
                }
                Err(AttemptError::Store(e)) => {
                    rollback_logged(tx, "reconcile").await;
                    return Err(storage_error("reconcile", e));
                }
                Err(AttemptError::Domain(e)) => {
                    rollback_logged(tx, "reconcile").await;
                    return Err(e);
                }
            };

            match tx.commit().await {
                Ok(()) => {}
                Err(StoreError::Conflict) => {
                    warn!(%session_id, attempt, "reconciliation commit conflicted; retrying");
                    continue;
                }
                Err(e) => return Err(storage_error("commit reconciliation", e)),
            }

            info!(
                %session_id,
                attempt,
                deductions = done.deductions.len(),
                has_variance = done.session.has_variance,
                "session reconciled"
            );

            let mut warnings = done.warnings;
            warnings.extend(self.write_completion_log(&done.session, &done.deductions, done.completed_at).await);

            return Ok(ReconcileOutcome {
                has_variance: done.session.has_variance,
                session: done.session,
                deductions: done.deductions,
                usage_ratio: done.usage_ratio,
                attempts: attempt,
                warnings,
            });
        }

        error!(%session_id, attempts = attempt, "reconciliation retries exhausted");
        Err(DistributionError::ReconciliationFailed { attempts: attempt })
    }

    /// Best-effort: failures become warnings, never errors.
    async fn write_completion_log(
        &self,
        session: &DistributionSession,
        deductions: &[Deduction],
        ts: DateTime<Utc>,
    ) -> Vec<String> {
        let mut warnings = Vec::new();

        for d in deductions {
            if let Err(e) = self.sink.append(&entries::inventory_deducted(session, d, ts)).await {
                warn!(session_id = %session.id, item_id = %d.inventory_item_id, error = %e, "log write failed");
                warnings.push(format!(
                    "log write failed for inventory_deducted {}: {e:#}",
                    d.inventory_item_id
                ));
            }
        }

        if let Err(e) = self
            .sink
            .append(&entries::counting_completed(session, deductions, ts))
            .await
        {
            warn!(session_id = %session.id, error = %e, "log write failed");
            warnings.push(format!("log write failed for counting_completed: {e:#}"));
        }

        warnings
    }
}

async fn run_attempt(
    tx: &mut dyn StoreTx,
    session_id: Uuid,
    final_meal_count: i64,
    now: DateTime<Utc>,
) -> Result<AttemptResult, AttemptError> {
    let mut session = tx
        .load_session(session_id)
        .await?
        .ok_or_else(|| DistributionError::NotFound {
            entity: "session",
            id: session_id.to_string(),
        })?;

    if session.status != SessionStatus::Active {
        return Err(DistributionError::InvalidState {
            session_id,
            status: session.status,
            operation: "complete",
        }
        .into());
    }

    if final_meal_count < 0 || final_meal_count > session.initial_meal_count {
        return Err(DistributionError::InvalidRange {
            field: "finalMealCount",
            value: final_meal_count,
            min: 0,
            max: session.initial_meal_count,
        }
        .into());
    }

    let distributed = session.initial_meal_count - final_meal_count;
    let planned = parse_planned_servings(&session.planned_servings);
    let ratio = usage_ratio(distributed, planned);

    let mut deductions = Vec::new();
    let mut warnings = Vec::new();

    for usage in session.ingredient_usage.iter_mut() {
        let needed = actual_quantity_needed(usage.expected_quantity, distributed, planned);
        usage.actual_quantity = Some(needed);
        usage.deducted_quantity = 0;
        usage.deducted_from_inventory = false;
        usage.deducted_at = None;
        usage.variance = 0;
        usage.variance_percentage = 0.0;

        let Some(item_id) = usage.inventory_item_id.clone() else {
            continue;
        };
        if needed == 0 {
            continue;
        }

        let Some(movement) = apply_clamped_deduction(&mut *tx, &item_id, needed).await? else {
            warnings.push(format!(
                "inventory item {item_id} for {} no longer exists; nothing deducted",
                usage.product_name
            ));
            continue;
        };

        // Non-zero exactly when stock could not cover the need.
        let variance = needed - movement.deducted;
        usage.variance = variance;
        usage.variance_percentage = variance_percentage(variance, usage.expected_quantity);

        if movement.deducted > 0 {
            usage.deducted_quantity = movement.deducted;
            usage.deducted_from_inventory = true;
            usage.deducted_at = Some(now);
            deductions.push(Deduction {
                inventory_item_id: item_id,
                product_name: usage.product_name.clone(),
                needed,
                deducted: movement.deducted,
                quantity_before: movement.quantity_before,
                quantity_after: movement.quantity_after,
                variance,
            });
        }
    }

    session.has_variance = session.ingredient_usage.iter().any(|u| u.variance != 0);
    session.status = SessionStatus::Completed;
    session.final_meal_count = Some(final_meal_count);
    session.distributed_meal_count = Some(distributed);
    session.completed_at = Some(now);

    tx.update_session(&session).await?;

    Ok(AttemptResult {
        session,
        deductions,
        usage_ratio: ratio,
        warnings,
        completed_at: now,
    })
}
