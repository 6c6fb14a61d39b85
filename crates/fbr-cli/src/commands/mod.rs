//! Command handlers for fbr-cli.
//!
//! Shared helpers live here; session lifecycle handlers live in [`session`].

pub mod session;

use std::fs;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use fbr_audit::{verify_hash_chain, FanoutLogSink, JsonlLogSink, LogSink, VerifyResult};
use fbr_config::{report_unused_keys, EngineConfig, UnusedKeyPolicy};
use fbr_db::{PgLogSink, PgStore};
use fbr_match::{parse_recipe, IngredientRejection, Resolver};
use fbr_schemas::Recipe;
use fbr_session::{DistributionService, SessionPolicy};
use serde_json::Value;

/// Defaults when no `--config` is given. Unused keys are warnings, not errors.
pub fn load_engine_config(paths: &[String]) -> Result<EngineConfig> {
    if paths.is_empty() {
        return Ok(EngineConfig::default());
    }

    let loaded = fbr_config::load_layered_yaml(paths)?;
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        eprintln!(
            "WARN: CONFIG_UNUSED_KEYS unused_leaf_keys={}",
            report.unused_leaf_pointers.len()
        );
        for p in report.unused_leaf_pointers.iter().take(50) {
            eprintln!("  unused={}", p);
        }
    }

    tracing::debug!(config_hash = %loaded.config_hash, "config loaded");
    loaded.engine()
}

/// Service over Postgres, logging to both `distribution_log` and the JSONL file.
pub async fn open_service(cfg: &EngineConfig) -> Result<DistributionService> {
    let pool = fbr_db::connect_from_env().await?;

    let mut sinks: Vec<Arc<dyn LogSink>> = vec![Arc::new(PgLogSink::new(pool.clone()))];
    sinks.extend(open_file_sink(cfg));

    let resolver = Resolver::default()
        .with_threshold(cfg.matching.threshold)
        .with_brand_weight(cfg.matching.brand_weight);
    let policy = SessionPolicy {
        single_active_per_recipe: cfg.sessions.single_active_per_recipe,
        stale_after: Duration::hours(cfg.sessions.stale_after_hours),
    };

    Ok(DistributionService::new(Arc::new(PgStore::new(pool)), Arc::new(FanoutLogSink::new(sinks)))
        .with_resolver(resolver)
        .with_policy(policy)
        .with_max_attempts(cfg.reconcile.max_attempts))
}

/// The JSONL log, or `None` when it cannot be opened. Log trouble never
/// blocks the inventory path; the database log still records every entry.
pub fn open_file_sink(cfg: &EngineConfig) -> Option<Arc<dyn LogSink>> {
    match JsonlLogSink::open(&cfg.audit.path, cfg.audit.hash_chain) {
        Ok(sink) => Some(Arc::new(sink)),
        Err(e) => {
            tracing::warn!(path = %cfg.audit.path, error = %e, "distribution log file unavailable");
            eprintln!("WARN: distribution log file unavailable path={} error={:#}", cfg.audit.path, e);
            None
        }
    }
}

/// Load a generator recipe file. Malformed ingredients are dropped and
/// reported; a recipe without a name is an error.
pub fn load_recipe_file(path: &str) -> Result<(Recipe, Vec<IngredientRejection>)> {
    let bytes = fs::read(path).with_context(|| format!("read recipe file failed: {}", path))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw = String::from_utf8(bytes.to_vec()).context("recipe file must be UTF-8 text")?;
    let v: Value = serde_json::from_str(raw.trim()).context("recipe file must contain valid JSON")?;

    let (recipe, rejected) = parse_recipe(&v)?;
    for r in &rejected {
        eprintln!("WARN: rejected_ingredient {}", r);
    }
    Ok((recipe, rejected))
}

pub fn print_warnings(warnings: &[String]) {
    for w in warnings {
        eprintln!("WARN: {}", w);
    }
}

pub fn audit_verify(path: &str) -> Result<()> {
    match verify_hash_chain(path)? {
        VerifyResult::Valid { lines } => {
            println!("audit_valid=true lines={} path={}", lines, path);
            Ok(())
        }
        VerifyResult::Broken { line, reason } => {
            println!("audit_valid=false line={} path={}", line, path);
            bail!("distribution log chain broken at line {}: {}", line, reason)
        }
    }
}
