use std::sync::Arc;

use chrono::{DateTime, Utc};
use fbr_audit::{entries, LogSink};
use fbr_match::{availability_report, AvailabilityWarning, Resolver};
use fbr_reconcile::{rollback_logged, DistributionError, ReconcileOutcome, Reconciler};
use fbr_schemas::{
    DistributionSession, IngredientUsage, RecipeIngredient, ResolvedIngredient, SessionStatus,
};
use fbr_store::{InventoryStore, StoreError, StoreTx};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::policy::SessionPolicy;
use crate::suggest::suggest_initial_count;

/// Everything `start` needs. Resolution has already happened.
#[derive(Debug, Clone, PartialEq)]
pub struct StartSession {
    pub food_bank_id: String,
    pub recipe_id: String,
    pub recipe_name: String,
    pub planned_servings: String,
    pub initial_meal_count: i64,
    pub ingredients: Vec<ResolvedIngredient>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
    pub session: DistributionSession,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOutcome {
    pub session: DistributionSession,
    pub warnings: Vec<String>,
}

/// One line of the stale-session report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleSession {
    pub session_id: Uuid,
    pub recipe_id: String,
    pub recipe_name: String,
    pub started_at: DateTime<Utc>,
    pub age_hours: i64,
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

fn storage_error(operation: &'static str, e: StoreError) -> DistributionError {
    error!(operation, error = %e, "store operation failed");
    DistributionError::Storage { operation }
}

fn require_non_blank(field: &'static str, value: &str) -> Result<(), DistributionError> {
    if value.trim().is_empty() {
        return Err(DistributionError::invalid_input(field, "must not be blank"));
    }
    Ok(())
}

/// Entry point for every caller-facing distribution operation.
///
/// Ownership checks (`session.food_bank_id == caller`) belong to the caller.
#[derive(Clone)]
pub struct DistributionService {
    store: Arc<dyn InventoryStore>,
    sink: Arc<dyn LogSink>,
    resolver: Resolver,
    reconciler: Reconciler,
    policy: SessionPolicy,
}

impl DistributionService {
    pub fn new(store: Arc<dyn InventoryStore>, sink: Arc<dyn LogSink>) -> Self {
        let reconciler = Reconciler::new(Arc::clone(&store), Arc::clone(&sink));
        Self {
            store,
            sink,
            resolver: Resolver::default(),
            reconciler,
            policy: SessionPolicy::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attempt budget shared by start, complete and cancel.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.reconciler = self.reconciler.with_max_attempts(max_attempts);
        self
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Bind ingredients against the current committed inventory. Read-only;
    /// safe to call as often as the operator likes before `start`.
    pub async fn resolve(
        &self,
        food_bank_id: &str,
        ingredients: &[RecipeIngredient],
    ) -> Result<Vec<ResolvedIngredient>, DistributionError> {
        let inventory = self
            .store
            .inventory_snapshot(food_bank_id)
            .await
            .map_err(|e| storage_error("read inventory", e))?;
        Ok(self.resolver.resolve_all(ingredients, &inventory))
    }

    /// Shortage warnings for the operator. Never blocks `start`.
    pub async fn availability(
        &self,
        food_bank_id: &str,
        resolved: &[ResolvedIngredient],
    ) -> Result<Vec<AvailabilityWarning>, DistributionError> {
        let inventory = self
            .store
            .inventory_snapshot(food_bank_id)
            .await
            .map_err(|e| storage_error("read inventory", e))?;
        Ok(availability_report(resolved, &inventory))
    }

    pub async fn suggest(
        &self,
        food_bank_id: &str,
        resolved: &[ResolvedIngredient],
        planned_servings: &str,
    ) -> Result<i64, DistributionError> {
        let inventory = self
            .store
            .inventory_snapshot(food_bank_id)
            .await
            .map_err(|e| storage_error("read inventory", e))?;
        Ok(suggest_initial_count(resolved, &inventory, planned_servings))
    }

    /// Create an `active` session and log `session_started`.
    ///
    /// Expected quantities are the recipe's full-batch estimates verbatim.
    pub async fn start(&self, req: StartSession) -> Result<StartOutcome, DistributionError> {
        require_non_blank("foodBankId", &req.food_bank_id)?;
        require_non_blank("recipeId", &req.recipe_id)?;
        require_non_blank("recipeName", &req.recipe_name)?;
        if req.initial_meal_count <= 0 {
            return Err(DistributionError::invalid_input(
                "initialMealCount",
                format!("must be > 0 (got {})", req.initial_meal_count),
            ));
        }

        let session = DistributionSession {
            id: Uuid::new_v4(),
            food_bank_id: req.food_bank_id,
            recipe_id: req.recipe_id,
            recipe_name: req.recipe_name,
            planned_servings: req.planned_servings,
            status: SessionStatus::Active,
            ingredient_usage: req.ingredients.iter().map(IngredientUsage::from_resolved).collect(),
            initial_meal_count: req.initial_meal_count,
            final_meal_count: None,
            distributed_meal_count: None,
            has_variance: false,
            started_at: Utc::now(),
            completed_at: None,
            cancelled_at: None,
        };

        let max_attempts = self.reconciler.max_attempts();
        for attempt in 1..=max_attempts {
            let mut tx = match self.store.begin().await {
                Ok(tx) => tx,
                Err(StoreError::Conflict) => continue,
                Err(e) => return Err(storage_error("begin start", e)),
            };

            match start_attempt(tx.as_mut(), &session, self.policy.single_active_per_recipe).await {
                Ok(()) => {}
                Err(AttemptError::Store(StoreError::Conflict)) => {
                    rollback_logged(tx, "start session").await;
                    warn!(session_id = %session.id, attempt, "start conflicted; retrying");
                    continue;
                }
                Err(AttemptError::Store(e)) => {
                    rollback_logged(tx, "start session").await;
                    return Err(storage_error("start session", e));
                }
                Err(AttemptError::Domain(e)) => {
                    rollback_logged(tx, "start session").await;
                    return Err(e);
                }
            }

            match tx.commit().await {
                Ok(()) => {}
                Err(StoreError::Conflict) => {
                    warn!(session_id = %session.id, attempt, "start commit conflicted; retrying");
                    continue;
                }
                Err(e) => return Err(storage_error("commit start", e)),
            }

            info!(
                session_id = %session.id,
                recipe_id = %session.recipe_id,
                initial = session.initial_meal_count,
                "session started"
            );

            let mut warnings = Vec::new();
            if let Err(e) = self
                .sink
                .append(&entries::session_started(&session, session.started_at))
                .await
            {
                warn!(session_id = %session.id, error = %e, "log write failed");
                warnings.push(format!("log write failed for session_started: {e:#}"));
            }

            return Ok(StartOutcome { session, warnings });
        }

        error!(session_id = %session.id, attempts = max_attempts, "start retries exhausted");
        Err(DistributionError::Storage { operation: "start session" })
    }

    /// Close an active session with the observed leftover count.
    pub async fn complete(
        &self,
        session_id: Uuid,
        final_meal_count: i64,
    ) -> Result<ReconcileOutcome, DistributionError> {
        self.reconciler.reconcile(session_id, final_meal_count).await
    }

    /// Abandon an active session. Inventory is never touched.
    pub async fn cancel(&self, session_id: Uuid) -> Result<CancelOutcome, DistributionError> {
        let max_attempts = self.reconciler.max_attempts();
        for attempt in 1..=max_attempts {
            let mut tx = match self.store.begin().await {
                Ok(tx) => tx,
                Err(StoreError::Conflict) => continue,
                Err(e) => return Err(storage_error("begin cancel", e)),
            };

            let session = match cancel_attempt(tx.as_mut(), session_id, Utc::now()).await {
                Ok(s) => s,
                Err(AttemptError::Store(StoreError::Conflict)) => {
                    rollback_logged(tx, "cancel session").await;
                    warn!(%session_id, attempt, "cancel conflicted; retrying");
                    continue;
                }
                Err(AttemptError::Store(e)) => {
                    rollback_logged(tx, "cancel session").await;
                    return Err(storage_error("cancel session", e));
                }
                Err(AttemptError::Domain(e)) => {
                    rollback_logged(tx, "cancel session").await;
                    return Err(e);
                }
            };

            match tx.commit().await {
                Ok(()) => {}
                Err(StoreError::Conflict) => {
                    warn!(%session_id, attempt, "cancel commit conflicted; retrying");
                    continue;
                }
                Err(e) => return Err(storage_error("commit cancel", e)),
            }

            info!(%session_id, "session cancelled");

            let mut warnings = Vec::new();
            let ts = session.cancelled_at.unwrap_or_else(Utc::now);
            if let Err(e) = self.sink.append(&entries::session_cancelled(&session, ts)).await {
                warn!(%session_id, error = %e, "log write failed");
                warnings.push(format!("log write failed for session_cancelled: {e:#}"));
            }

            return Ok(CancelOutcome { session, warnings });
        }

        error!(%session_id, attempts = max_attempts, "cancel retries exhausted");
        Err(DistributionError::Storage { operation: "cancel session" })
    }

    pub async fn get(&self, session_id: Uuid) -> Result<DistributionSession, DistributionError> {
        self.store
            .fetch_session(session_id)
            .await
            .map_err(|e| storage_error("fetch session", e))?
            .ok_or_else(|| DistributionError::NotFound {
                entity: "session",
                id: session_id.to_string(),
            })
    }

    /// Oldest first. `status = None` lists every session.
    pub async fn list(
        &self,
        food_bank_id: &str,
        status: Option<SessionStatus>,
    ) -> Result<Vec<DistributionSession>, DistributionError> {
        self.store
            .list_sessions(food_bank_id, status)
            .await
            .map_err(|e| storage_error("list sessions", e))
    }

    /// Active sessions started at least `policy.stale_after` before `now`.
    /// Report only; nothing is expired automatically.
    pub async fn stale_sessions(
        &self,
        food_bank_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<StaleSession>, DistributionError> {
        let active = self.list(food_bank_id, Some(SessionStatus::Active)).await?;
        Ok(active
            .into_iter()
            .filter(|s| now - s.started_at >= self.policy.stale_after)
            .map(|s| StaleSession {
                session_id: s.id,
                age_hours: (now - s.started_at).num_hours(),
                recipe_id: s.recipe_id,
                recipe_name: s.recipe_name,
                started_at: s.started_at,
            })
            .collect())
    }
}

async fn start_attempt(
    tx: &mut dyn StoreTx,
    session: &DistributionSession,
    single_active_per_recipe: bool,
) -> Result<(), AttemptError> {
    if single_active_per_recipe {
        if let Some(existing) = tx
            .active_session_for_recipe(&session.food_bank_id, &session.recipe_id)
            .await?
        {
            return Err(DistributionError::ActiveSessionExists {
                recipe_id: session.recipe_id.clone(),
                session_id: existing,
            }
            .into());
        }
    }
    tx.insert_session(session).await?;
    Ok(())
}

async fn cancel_attempt(
    tx: &mut dyn StoreTx,
    session_id: Uuid,
    now: DateTime<Utc>,
) -> Result<DistributionSession, AttemptError> {
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
            operation: "cancel",
        }
        .into());
    }

    session.status = SessionStatus::Cancelled;
    session.cancelled_at = Some(now);
    tx.update_session(&session).await?;
    Ok(session)
}
