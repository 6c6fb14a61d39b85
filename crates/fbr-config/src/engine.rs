use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum total score for the resolver to bind an ingredient.
    pub threshold: f64,
    /// Multiplier applied to the brand-name score.
    pub brand_weight: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            brand_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub max_attempts: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub single_active_per_recipe: bool,
    pub stale_after_hours: i64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            single_active_per_recipe: true,
            stale_after_hours: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub path: String,
    pub hash_chain: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: "exports/distribution_log.jsonl".to_string(),
            hash_chain: true,
        }
    }
}

/// Typed engine settings. Missing sections and keys take their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matching: MatchingConfig,
    pub reconcile: ReconcileConfig,
    pub sessions: SessionsConfig,
    pub audit: AuditConfig,
}

impl EngineConfig {
    /// Extract from merged config JSON. Unknown keys are ignored here; use
    /// [`report_unused_keys`](crate::report_unused_keys) to surface them.
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: EngineConfig =
            serde_json::from_value(config_json.clone()).context("invalid engine config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let m = &self.matching;
        if !m.threshold.is_finite() || m.threshold < 0.0 {
            bail!("CONFIG_INVALID matching.threshold={} must be a finite number >= 0", m.threshold);
        }
        if !m.brand_weight.is_finite() || m.brand_weight < 0.0 {
            bail!(
                "CONFIG_INVALID matching.brand_weight={} must be a finite number >= 0",
                m.brand_weight
            );
        }
        if self.reconcile.max_attempts < 1 {
            bail!("CONFIG_INVALID reconcile.max_attempts=0 must be >= 1");
        }
        if self.sessions.stale_after_hours <= 0 {
            bail!(
                "CONFIG_INVALID sessions.stale_after_hours={} must be > 0",
                self.sessions.stale_after_hours
            );
        }
        if self.audit.path.trim().is_empty() {
            bail!("CONFIG_INVALID audit.path must not be blank");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_config_is_all_defaults() {
        let cfg = EngineConfig::from_json(&json!({})).unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.matching.threshold, 0.5);
        assert_eq!(cfg.reconcile.max_attempts, 5);
        assert_eq!(cfg.audit.path, "exports/distribution_log.jsonl");
    }

    #[test]
    fn partial_sections_keep_sibling_defaults() {
        let cfg = EngineConfig::from_json(&json!({"sessions": {"stale_after_hours": 48}})).unwrap();
        assert_eq!(cfg.sessions.stale_after_hours, 48);
        assert!(cfg.sessions.single_active_per_recipe);
    }

    #[test]
    fn out_of_range_values_rejected() {
        let e = EngineConfig::from_json(&json!({"reconcile": {"max_attempts": 0}})).unwrap_err();
        assert!(e.to_string().contains("reconcile.max_attempts"), "{e}");

        let e = EngineConfig::from_json(&json!({"sessions": {"stale_after_hours": 0}})).unwrap_err();
        assert!(e.to_string().contains("sessions.stale_after_hours"), "{e}");

        let e = EngineConfig::from_json(&json!({"matching": {"threshold": -0.1}})).unwrap_err();
        assert!(e.to_string().contains("matching.threshold"), "{e}");
    }

    #[test]
    fn wrong_type_is_an_error() {
        assert!(EngineConfig::from_json(&json!({"reconcile": {"max_attempts": "five"}})).is_err());
    }
}
