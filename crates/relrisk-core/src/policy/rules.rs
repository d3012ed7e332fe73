//! Policy rule table.
//!
//! Each [`PolicyRule`] is a pure predicate over (input, context, candidate)
//! with a fixed effect and a fixed rationale. Hard rules force `NO_GO`;
//! advisory rules only contribute a recommended action.

use serde::{Deserialize, Serialize};

use crate::domain::{CandidateAssessment, Context, FiredRule, ReleaseInput};

/// Default score above which a release is forced to `NO_GO`.
pub const DEFAULT_RISK_THRESHOLD: f64 = 0.7;

/// Default line count above which a change is considered large.
pub const DEFAULT_MAX_LINES: u64 = 500;

const MIGRATION_PATTERNS: &[&str] = &["migration", "alembic", "flyway", "liquibase"];

const AUTH_PATTERNS: &[&str] = &[
    "auth",
    "login",
    "session",
    "token",
    "oauth",
    "permission",
    "rbac",
    "acl",
];

const SOURCE_PREFIXES: &[&str] = &["src/", "lib/", "app/"];

/// What a firing rule does to the output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleEffect {
    /// Force `NO_GO` and record the rationale as a risk factor.
    ForceNoGo,
    /// Append a recommended action; decision and score untouched.
    Advise,
}

/// A single policy rule.
///
/// Only variants whose [`PolicyRule::effect`] is [`RuleEffect::ForceNoGo`]
/// are hard rules: `CiFailing`, `RiskScoreInvalid` and `RiskThreshold`.
/// A firing hard rule always forces `NO_GO`. The remaining variants are
/// advisories and never change the decision or the score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyRule {
    /// Any CI check reported by the input or the context failed.
    CiFailing,
    /// Candidate score is NaN or infinite.
    RiskScoreInvalid,
    /// Candidate score strictly above `threshold`.
    RiskThreshold { threshold: f64 },
    /// A changed path contains a migration tool pattern.
    DatabaseMigration { patterns: Vec<String> },
    /// A changed path touches authentication or authorization code.
    AuthChanges { patterns: Vec<String> },
    /// Recent incidents are listed for the target.
    DeployDuringIncident,
    /// Total additions plus deletions above `max_lines`.
    LargeChange { max_lines: u64 },
    /// Source files changed without any test file changes.
    MissingTests,
}

impl PolicyRule {
    /// Stable rule name, used in provenance and in the YAML config.
    pub fn name(&self) -> &'static str {
        match self {
            PolicyRule::CiFailing => "ci_failing",
            PolicyRule::RiskScoreInvalid => "risk_score_invalid",
            PolicyRule::RiskThreshold { .. } => "risk_threshold",
            PolicyRule::DatabaseMigration { .. } => "database_migration",
            PolicyRule::AuthChanges { .. } => "auth_changes",
            PolicyRule::DeployDuringIncident => "deploy_during_incident",
            PolicyRule::LargeChange { .. } => "large_change",
            PolicyRule::MissingTests => "missing_tests",
        }
    }

    pub fn effect(&self) -> RuleEffect {
        match self {
            PolicyRule::CiFailing
            | PolicyRule::RiskScoreInvalid
            | PolicyRule::RiskThreshold { .. } => RuleEffect::ForceNoGo,
            _ => RuleEffect::Advise,
        }
    }

    /// Fixed rationale text. Never depends on the evaluated facts.
    pub fn rationale(&self) -> &'static str {
        match self {
            PolicyRule::CiFailing => "CI failing",
            PolicyRule::RiskScoreInvalid => "risk score missing or invalid",
            PolicyRule::RiskThreshold { .. } => "risk score above threshold",
            PolicyRule::DatabaseMigration { .. } => "database migration files detected",
            PolicyRule::AuthChanges { .. } => "authentication or authorization code changed",
            PolicyRule::DeployDuringIncident => "recent incidents reported; consider delaying",
            PolicyRule::LargeChange { .. } => "change exceeds size limit",
            PolicyRule::MissingTests => "source changes without test changes",
        }
    }

    /// Evaluate the rule, returning the firing record when the predicate holds.
    pub fn check(
        &self,
        input: &ReleaseInput,
        context: &Context,
        candidate: &CandidateAssessment,
    ) -> Option<FiredRule> {
        let detail = match self {
            PolicyRule::CiFailing => {
                let mut failed = input.failed_checks();
                for name in context.failed_checks() {
                    if !failed.contains(&name) {
                        failed.push(name);
                    }
                }
                if failed.is_empty() {
                    return None;
                }
                Some(format!("failed checks: {}", failed.join(", ")))
            }
            PolicyRule::RiskScoreInvalid => {
                if is_valid_score(candidate.risk_score) {
                    return None;
                }
                Some(format!("reported score {}", candidate.risk_score))
            }
            PolicyRule::RiskThreshold { threshold } => {
                let score = effective_score(candidate.risk_score);
                if score <= *threshold {
                    return None;
                }
                Some(format!("{score:.2} > {threshold:.2}"))
            }
            PolicyRule::DatabaseMigration { patterns } | PolicyRule::AuthChanges { patterns } => {
                let matched = matching_paths(input, patterns);
                if matched.is_empty() {
                    return None;
                }
                Some(matched.join(", "))
            }
            PolicyRule::DeployDuringIncident => {
                let mut incidents: Vec<&str> =
                    input.recent_incidents.iter().map(String::as_str).collect();
                for incident in &context.incidents {
                    if !incidents.contains(&incident.as_str()) {
                        incidents.push(incident);
                    }
                }
                let count = incidents.len();
                if count == 0 {
                    return None;
                }
                Some(format!("{count} recent incident(s)"))
            }
            PolicyRule::LargeChange { max_lines } => {
                let total = input.total_lines_changed();
                if total <= *max_lines {
                    return None;
                }
                Some(format!("{total} lines changed (limit {max_lines})"))
            }
            PolicyRule::MissingTests => {
                let paths: Vec<&str> = input.files_changed.iter().map(|f| f.path.as_str()).collect();
                if paths.iter().any(|p| is_test_path(p)) {
                    return None;
                }
                let sources: Vec<&str> = paths.into_iter().filter(|p| is_source_path(p)).collect();
                if sources.is_empty() {
                    return None;
                }
                Some(sources.join(", "))
            }
        };

        Some(FiredRule {
            rule: self.name().to_string(),
            rationale: self.rationale().to_string(),
            detail,
        })
    }

    /// Standard migration patterns.
    pub fn database_migration() -> Self {
        PolicyRule::DatabaseMigration {
            patterns: MIGRATION_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Standard auth patterns.
    pub fn auth_changes() -> Self {
        PolicyRule::AuthChanges {
            patterns: AUTH_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// A score is valid when it is finite and within `[0, 1]`.
pub(crate) fn is_valid_score(score: f64) -> bool {
    score.is_finite() && (0.0..=1.0).contains(&score)
}

/// Invalid scores are treated as maximal risk.
pub(crate) fn effective_score(score: f64) -> f64 {
    if is_valid_score(score) {
        score
    } else {
        1.0
    }
}

fn matching_paths<'a>(input: &'a ReleaseInput, patterns: &[String]) -> Vec<&'a str> {
    let patterns: Vec<String> = patterns.iter().map(|p| p.to_lowercase()).collect();
    input
        .files_changed
        .iter()
        .filter(|f| {
            let path = f.path.to_lowercase();
            patterns.iter().any(|p| !p.is_empty() && path.contains(p.as_str()))
        })
        .map(|f| f.path.as_str())
        .collect()
}

fn is_source_path(path: &str) -> bool {
    let path = path.to_lowercase();
    SOURCE_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) && !is_test_path(&path)
}

fn is_test_path(path: &str) -> bool {
    let path = path.to_lowercase();
    let mut segments = path.split('/').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_some() {
            if matches!(segment, "test" | "tests" | "__tests__" | "spec" | "specs") {
                return true;
            }
        } else {
            return segment.starts_with("test_")
                || segment.contains("_test.")
                || segment.contains(".test.")
                || segment.contains(".spec.");
        }
    }
    false
}

/// Ordered rule table evaluated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyRuleSet {
    pub rules: Vec<PolicyRule>,
}

impl PolicyRuleSet {
    /// Hard rules first, then advisories, in their fixed priority order.
    pub fn standard() -> Self {
        Self {
            rules: vec![
                PolicyRule::CiFailing,
                PolicyRule::RiskScoreInvalid,
                PolicyRule::RiskThreshold {
                    threshold: DEFAULT_RISK_THRESHOLD,
                },
                PolicyRule::database_migration(),
                PolicyRule::auth_changes(),
                PolicyRule::DeployDuringIncident,
                PolicyRule::LargeChange {
                    max_lines: DEFAULT_MAX_LINES,
                },
                PolicyRule::MissingTests,
            ],
        }
    }

    /// Only the hard rules of [`PolicyRuleSet::standard`].
    pub fn hard_only() -> Self {
        Self {
            rules: Self::standard()
                .rules
                .into_iter()
                .filter(|r| r.effect() == RuleEffect::ForceNoGo)
                .collect(),
        }
    }

    /// Add a rule at the end of the table.
    pub fn with_rule(mut self, rule: PolicyRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Remove every rule with the given name.
    pub fn without(mut self, name: &str) -> Self {
        self.rules.retain(|r| r.name() != name);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(PolicyRule::name).collect()
    }
}

impl Default for PolicyRuleSet {
    fn default() -> Self {
        Self::standard()
    }
}
