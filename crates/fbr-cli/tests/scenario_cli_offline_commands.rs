//! CLI commands that need no database.
//!
//! GREEN when:
//! - `fbr config-hash` prints a stable hash and the canonical JSON
//! - `fbr config-hash` refuses a credential literal
//! - `fbr audit verify` accepts an intact log and rejects an edited one
//! - `fbr db status` without FBR_DATABASE_URL fails naming the variable

use assert_cmd::prelude::*;
use chrono::Utc;
use fbr_audit::{entries, JsonlLogSink, LogSink};
use fbr_schemas::{DistributionSession, SessionStatus};
use predicates::prelude::*;
use std::process::Command;
use uuid::Uuid;

fn fbr(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("fbr").unwrap();
    cmd.current_dir(dir).env_remove("FBR_DATABASE_URL").env("RUST_LOG", "off");
    cmd
}

fn session() -> DistributionSession {
    DistributionSession {
        id: Uuid::new_v4(),
        food_bank_id: "fb-1".to_string(),
        recipe_id: "pasta-bake".to_string(),
        recipe_name: "Pasta Bake".to_string(),
        planned_servings: "50 people".to_string(),
        status: SessionStatus::Active,
        ingredient_usage: vec![],
        initial_meal_count: 50,
        final_meal_count: None,
        distributed_meal_count: None,
        has_variance: false,
        started_at: Utc::now(),
        completed_at: None,
        cancelled_at: None,
    }
}

#[test]
fn config_hash_prints_hash_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    std::fs::write(&base, "matching:\n  threshold: 0.6\n").unwrap();

    fbr(dir.path())
        .args(["config-hash", base.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("config_hash="))
        .stdout(predicate::str::contains(r#"{"matching":{"threshold":0.6}}"#));
}

#[test]
fn config_hash_rejects_secret_literal() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    std::fs::write(&base, "database:\n  url: \"postgres://u:p@localhost/fbr\"\n").unwrap();

    fbr(dir.path())
        .args(["config-hash", base.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"));
}

#[tokio::test]
async fn audit_verify_accepts_intact_and_rejects_edited_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("distribution_log.jsonl");
    {
        let sink = JsonlLogSink::open(&log, true).unwrap();
        let s = session();
        sink.append(&entries::session_started(&s, Utc::now())).await.unwrap();
        sink.append(&entries::session_cancelled(&s, Utc::now())).await.unwrap();
    }

    fbr(dir.path())
        .args(["audit", "verify", "--path", log.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("audit_valid=true lines=2"));

    let tampered = std::fs::read_to_string(&log)
        .unwrap()
        .replace("\"initialMealCount\":50", "\"initialMealCount\":40");
    std::fs::write(&log, tampered).unwrap();

    fbr(dir.path())
        .args(["audit", "verify", "--path", log.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("audit_valid=false line=1"))
        .stderr(predicate::str::contains("chain broken"));
}

#[test]
fn db_status_requires_database_url() {
    let dir = tempfile::tempdir().unwrap();
    fbr(dir.path())
        .args(["db", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing env var FBR_DATABASE_URL"));
}
