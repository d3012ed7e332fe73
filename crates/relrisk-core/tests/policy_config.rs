//! Loading policy configuration from disk.

use std::fs;

use relrisk_core::{
    load_policy_config, load_rule_set, CandidateAssessment, Context, Decision, FileChange,
    PolicyConfig, PolicyConfigError, PolicyEngine, PolicyRule, PolicyRuleSet, ReleaseInput,
    RiskFactor, RiskLevel,
};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let cfg = load_policy_config(&dir.path().join("absent.yaml")).unwrap();
    assert_eq!(cfg, PolicyConfig::default());
}

#[test]
fn test_no_path_yields_standard_rule_set() {
    assert_eq!(load_rule_set(None).unwrap(), PolicyRuleSet::standard());
}

#[test]
fn test_loaded_overrides_change_engine_behaviour() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "policy.yaml",
        r#"
rules:
  risk_threshold:
    threshold: 0.4
  database_migration:
    patterns: ["schema/"]
  missing_tests:
    enabled: false
"#,
    );

    let set = load_rule_set(Some(&path)).unwrap();
    assert!(set.rules.contains(&PolicyRule::RiskThreshold { threshold: 0.4 }));
    assert!(!set.names().contains(&"missing_tests"));

    let engine = PolicyEngine::new(set);
    let input = ReleaseInput::new("myorg/backend-api", 9, "Alter schema")
        .with_files(vec![FileChange::new("schema/users.sql", 10, 0)]);
    let candidate = CandidateAssessment::new(Decision::Go, 0.5)
        .with_factor(RiskFactor::new("schema", "column rename", RiskLevel::Medium));

    let out = engine.evaluate(&input, &Context::empty(), &candidate);

    assert_eq!(out.decision, Decision::NoGo);
    assert_eq!(out.provenance.fired_rule_names(), vec!["risk_threshold"]);
    let advisories: Vec<&str> = out
        .provenance
        .advisories
        .iter()
        .map(|a| a.rule.as_str())
        .collect();
    assert_eq!(advisories, vec!["database_migration"]);
}

#[test]
fn test_comment_only_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "policy.yaml", "# nothing configured yet\n");
    assert_eq!(load_policy_config(&path).unwrap(), PolicyConfig::default());
}

#[test]
fn test_unknown_field_in_rule_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "policy.yaml",
        "rules:\n  large_change:\n    max_line: 100\n",
    );
    let err = load_policy_config(&path).unwrap_err();
    assert!(matches!(err, PolicyConfigError::InvalidSchema(_)), "{err}");
}

#[test]
fn test_empty_pattern_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "policy.yaml",
        "rules:\n  auth_changes:\n    patterns: [\"auth\", \"  \"]\n",
    );
    let err = load_policy_config(&path).unwrap_err();
    assert!(matches!(err, PolicyConfigError::InvalidValue(_)), "{err}");
}

#[test]
fn test_directory_path_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load_policy_config(dir.path()).unwrap_err();
    assert!(matches!(err, PolicyConfigError::Io { .. }), "{err}");
}

#[test]
fn test_file_disabling_ci_gate_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "policy.yaml",
        "rules:\n  ci_failing:\n    enabled: false\n  risk_threshold:\n    threshold: 1.0\n",
    );
    let err = load_rule_set(Some(&path)).unwrap_err();
    assert!(matches!(err, PolicyConfigError::InvalidValue(_)), "{err}");
}
