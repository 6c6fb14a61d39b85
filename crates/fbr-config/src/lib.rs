//! fbr-config
//!
//! Layered YAML configuration. Documents merge in order (later wins), the
//! result is canonicalised to JSON and hashed so every session run can be
//! tied to the exact configuration it used.
//!
//! Secrets never live in YAML: the database URL comes from `FBR_DATABASE_URL`,
//! and any leaf string that looks like a credential aborts loading with
//! `CONFIG_SECRET_DETECTED`.

mod engine;
mod unused;

pub use engine::{AuditConfig, EngineConfig, MatchingConfig, ReconcileConfig, SessionsConfig};
pub use unused::{report_unused_keys, UnusedKeyPolicy, UnusedKeyReport, CONSUMED_POINTERS};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Leaf strings starting with any of these are treated as pasted credentials.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",
    "sk_live",
    "sk_test",
    "AKIA",
    "-----BEGIN",
    "ghp_",
    "gho_",
    "glpat-",
    "xoxb-",
    "xoxp-",
    "postgres://",
    "postgresql://",
];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view with defaults filled in and ranges checked.
    pub fn engine(&self) -> Result<EngineConfig> {
        EngineConfig::from_json(&self.config_json)
    }
}

pub fn load_layered_yaml<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let p = p.as_ref();
        let raw = fs::read_to_string(p)
            .with_context(|| format!("failed to read yaml path: {}", p.display()))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null; treat it as an empty layer.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

// serde_json's default Map is ordered by key, so this is already canonical.
fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    unused::collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_layer_wins_leafwise() {
        let base = "matching:\n  threshold: 0.5\n  brand_weight: 0.3\n";
        let site = "matching:\n  threshold: 0.7\n";
        let cfg = load_layered_yaml_from_strings(&[base, site]).unwrap();
        assert_eq!(cfg.config_json.pointer("/matching/threshold").unwrap(), 0.7);
        assert_eq!(cfg.config_json.pointer("/matching/brand_weight").unwrap(), 0.3);
    }

    #[test]
    fn empty_document_is_an_empty_layer() {
        let cfg = load_layered_yaml_from_strings(&["", "audit:\n  hash_chain: false\n"]).unwrap();
        assert_eq!(cfg.canonical_json, r#"{"audit":{"hash_chain":false}}"#);
    }

    #[test]
    fn short_strings_are_not_secrets() {
        assert!(!looks_like_secret("sk-1"));
        assert!(looks_like_secret("postgres://app:hunter2@db/fbr"));
    }
}
