//! YAML policy configuration.
//!
//! ```yaml
//! rules:
//!   risk_threshold:
//!     threshold: 0.5
//!   deploy_during_incident:
//!     enabled: false
//! ```
//!
//! A missing file yields the defaults. Rules are static once loaded.
//! Hard rules can only be tightened: they cannot be disabled and the risk
//! threshold cannot be raised above [`DEFAULT_RISK_THRESHOLD`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::rules::{PolicyRule, PolicyRuleSet, DEFAULT_RISK_THRESHOLD};

#[derive(Debug, thiserror::Error)]
pub enum PolicyConfigError {
    #[error("failed to read policy config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("policy config is not valid YAML: {0}")]
    InvalidYaml(#[source] serde_yaml::Error),

    #[error("policy config does not match schema: {0}")]
    InvalidSchema(#[source] serde_yaml::Error),

    #[error("invalid policy value: {0}")]
    InvalidValue(String),
}

fn enabled_default() -> bool {
    true
}

/// On/off switch for a rule with no parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ToggleConfig {
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ThresholdConfig {
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PatternsConfig {
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SizeConfig {
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub max_lines: Option<u64>,
}

/// Per-rule overrides, keyed by rule name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    #[serde(default)]
    pub ci_failing: Option<ToggleConfig>,
    #[serde(default)]
    pub risk_score_invalid: Option<ToggleConfig>,
    #[serde(default)]
    pub risk_threshold: Option<ThresholdConfig>,
    #[serde(default)]
    pub database_migration: Option<PatternsConfig>,
    #[serde(default)]
    pub auth_changes: Option<PatternsConfig>,
    #[serde(default)]
    pub deploy_during_incident: Option<ToggleConfig>,
    #[serde(default)]
    pub large_change: Option<SizeConfig>,
    #[serde(default)]
    pub missing_tests: Option<ToggleConfig>,
}

/// Top-level policy configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    #[serde(default)]
    pub rules: RulesConfig,
}

impl PolicyConfig {
    /// Parse and validate a YAML document. An empty document yields defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, PolicyConfigError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(PolicyConfigError::InvalidYaml)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: PolicyConfig =
            serde_yaml::from_value(value).map_err(PolicyConfigError::InvalidSchema)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but make no sense.
    pub fn validate(&self) -> Result<(), PolicyConfigError> {
        let r = &self.rules;
        for (name, enabled) in [
            ("ci_failing", r.ci_failing.as_ref().map(|c| c.enabled)),
            ("risk_score_invalid", r.risk_score_invalid.as_ref().map(|c| c.enabled)),
            ("risk_threshold", r.risk_threshold.as_ref().map(|c| c.enabled)),
        ] {
            if enabled == Some(false) {
                return Err(PolicyConfigError::InvalidValue(format!(
                    "{name} is a hard rule and cannot be disabled"
                )));
            }
        }
        if let Some(ThresholdConfig {
            threshold: Some(t), ..
        }) = &r.risk_threshold
        {
            if !t.is_finite() || !(0.0..=DEFAULT_RISK_THRESHOLD).contains(t) {
                return Err(PolicyConfigError::InvalidValue(format!(
                    "risk_threshold.threshold must be within [0.0, {DEFAULT_RISK_THRESHOLD}], got {t}"
                )));
            }
        }
        for (name, cfg) in [
            ("database_migration", &self.rules.database_migration),
            ("auth_changes", &self.rules.auth_changes),
        ] {
            if let Some(PatternsConfig {
                patterns: Some(patterns),
                ..
            }) = cfg
            {
                if patterns.iter().any(|p| p.trim().is_empty()) {
                    return Err(PolicyConfigError::InvalidValue(format!(
                        "{name}.patterns must not contain empty strings"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Apply overrides to `base`, dropping disabled advisories and keeping
    /// order. Hard rules are always kept.
    pub fn apply(&self, base: PolicyRuleSet) -> PolicyRuleSet {
        let rules = base
            .rules
            .into_iter()
            .filter_map(|rule| self.apply_rule(rule))
            .collect();
        PolicyRuleSet { rules }
    }

    fn apply_rule(&self, rule: PolicyRule) -> Option<PolicyRule> {
        let r = &self.rules;
        let toggle = |cfg: &Option<ToggleConfig>| cfg.as_ref().map_or(true, |c| c.enabled);

        match rule {
            PolicyRule::CiFailing | PolicyRule::RiskScoreInvalid => Some(rule),
            PolicyRule::DeployDuringIncident => toggle(&r.deploy_during_incident).then_some(rule),
            PolicyRule::MissingTests => toggle(&r.missing_tests).then_some(rule),
            PolicyRule::RiskThreshold { threshold } => {
                let configured = r.risk_threshold.as_ref().and_then(|c| c.threshold);
                Some(PolicyRule::RiskThreshold {
                    threshold: configured.map_or(threshold, |t| t.min(threshold)),
                })
            }
            PolicyRule::LargeChange { max_lines } => match &r.large_change {
                Some(cfg) if !cfg.enabled => None,
                Some(cfg) => Some(PolicyRule::LargeChange {
                    max_lines: cfg.max_lines.unwrap_or(max_lines),
                }),
                None => Some(PolicyRule::LargeChange { max_lines }),
            },
            PolicyRule::DatabaseMigration { patterns } => {
                override_patterns(&r.database_migration, patterns)
                    .map(|patterns| PolicyRule::DatabaseMigration { patterns })
            }
            PolicyRule::AuthChanges { patterns } => override_patterns(&r.auth_changes, patterns)
                .map(|patterns| PolicyRule::AuthChanges { patterns }),
        }
    }
}

fn override_patterns(cfg: &Option<PatternsConfig>, current: Vec<String>) -> Option<Vec<String>> {
    match cfg {
        Some(cfg) if !cfg.enabled => None,
        Some(cfg) => Some(cfg.patterns.clone().unwrap_or(current)),
        None => Some(current),
    }
}

/// Load a policy config file. A missing file yields the defaults.
pub fn load_policy_config(path: &Path) -> Result<PolicyConfig, PolicyConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "policy config not found, using defaults");
            return Ok(PolicyConfig::default());
        }
        Err(source) => {
            return Err(PolicyConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    PolicyConfig::from_yaml_str(&content)
}

/// Effective rule set for an optional config path.
pub fn load_rule_set(path: Option<&Path>) -> Result<PolicyRuleSet, PolicyConfigError> {
    let config = match path {
        Some(path) => load_policy_config(path)?,
        None => PolicyConfig::default(),
    };
    Ok(config.apply(PolicyRuleSet::standard()))
}
