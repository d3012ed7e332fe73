//! Candidate and final risk assessments.

use serde::{Deserialize, Serialize};

/// Binary release decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Go,
    NoGo,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Go => "GO",
            Decision::NoGo => "NO_GO",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse risk classification derived from a score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Band a score: `<= 0.3` low, `<= 0.5` medium, `<= 0.7` high, else critical.
    ///
    /// Non-finite scores band as critical.
    pub fn from_score(score: f64) -> Self {
        if !score.is_finite() {
            RiskLevel::Critical
        } else if score <= 0.3 {
            RiskLevel::Low
        } else if score <= 0.5 {
            RiskLevel::Medium
        } else if score <= 0.7 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

/// A single stated risk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskFactor {
    pub category: String,
    pub description: String,
    pub severity: RiskLevel,
}

impl RiskFactor {
    pub fn new(
        category: impl Into<String>,
        description: impl Into<String>,
        severity: RiskLevel,
    ) -> Self {
        Self {
            category: category.into(),
            description: description.into(),
            severity,
        }
    }
}

/// The model's proposed judgment, not yet checked by policy.
///
/// `risk_score` is a raw `f64` so that the policy engine can be exercised
/// against candidates the parser would never produce (NaN, out of range).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateAssessment {
    pub decision: Decision,
    pub risk_score: f64,
    pub risk_factors: Vec<RiskFactor>,
    pub recommended_actions: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl CandidateAssessment {
    /// Candidate with only the decision and score set.
    pub fn new(decision: Decision, risk_score: f64) -> Self {
        Self {
            decision,
            risk_score,
            risk_factors: Vec::new(),
            recommended_actions: Vec::new(),
            summary: String::new(),
            explanation: String::new(),
            conditions: Vec::new(),
        }
    }

    pub fn with_factor(mut self, factor: RiskFactor) -> Self {
        self.risk_factors.push(factor);
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.recommended_actions.push(action.into());
        self
    }
}

/// A policy rule that fired during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FiredRule {
    /// Stable rule name, e.g. `ci_failing`.
    pub rule: String,
    /// Fixed rationale text for the rule.
    pub rationale: String,
    /// Fact-specific detail (failed check names, matched paths, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Audit record of what policy did to the model's candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Provenance {
    /// Decision the model proposed.
    pub model_decision: Decision,
    /// True when the model proposed GO and policy forced NO_GO.
    pub overridden: bool,
    /// Hard rules that fired, in evaluation order.
    pub fired_rules: Vec<FiredRule>,
    /// Advisory rules that fired, in evaluation order.
    pub advisories: Vec<FiredRule>,
    /// The candidate score was unusable and 1.0 was substituted.
    pub score_substituted: bool,
    /// The score was moved into [0, 1].
    pub score_clamped: bool,
    /// Digest of the release input this output was computed from.
    pub input_digest: String,
}

impl Provenance {
    /// Whether any hard rule fired.
    pub fn policy_fired(&self) -> bool {
        !self.fired_rules.is_empty()
    }

    pub fn fired_rule_names(&self) -> Vec<&str> {
        self.fired_rules.iter().map(|r| r.rule.as_str()).collect()
    }
}

/// Final, policy-checked result returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseOutput {
    pub decision: Decision,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub risk_factors: Vec<RiskFactor>,
    pub recommended_actions: Vec<String>,
    pub summary: String,
    pub explanation: String,
    pub conditions: Vec<String>,
    pub provenance: Provenance,
}

impl ReleaseOutput {
    /// View this output as a candidate, for re-evaluation.
    pub fn as_candidate(&self) -> CandidateAssessment {
        CandidateAssessment {
            decision: self.decision,
            risk_score: self.risk_score,
            risk_factors: self.risk_factors.clone(),
            recommended_actions: self.recommended_actions.clone(),
            summary: self.summary.clone(),
            explanation: self.explanation.clone(),
            conditions: self.conditions.clone(),
        }
    }

    pub fn is_go(&self) -> bool {
        self.decision == Decision::Go
    }
}
