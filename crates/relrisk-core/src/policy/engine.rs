//! Deterministic policy engine.
//!
//! Turns a [`CandidateAssessment`] into the authoritative [`ReleaseOutput`].
//! Evaluation never fails: whatever the candidate holds, the output has a
//! valid decision, a score in `[0, 1]` and at least one risk factor when the
//! decision is `NO_GO`.

use crate::domain::{
    CandidateAssessment, Context, Decision, FiredRule, Provenance, ReleaseInput, ReleaseOutput,
    RiskFactor, RiskLevel,
};

use super::rules::{is_valid_score, PolicyRuleSet, RuleEffect};

/// Category used for risk factors recorded by policy.
pub const POLICY_CATEGORY: &str = "policy";

/// Factor description used when a `NO_GO` arrives with no stated risks.
pub const UNEXPLAINED_NO_GO: &str = "model returned NO_GO without stated risk factors";

/// Score substituted for a missing or invalid candidate score.
pub const SUBSTITUTE_SCORE: f64 = 1.0;

/// Evaluates a fixed rule table against per-request facts.
///
/// Read-only after construction; share freely behind `Arc`.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    rules: PolicyRuleSet,
}

impl PolicyEngine {
    pub fn new(rules: PolicyRuleSet) -> Self {
        Self { rules }
    }

    /// Engine with [`PolicyRuleSet::standard`].
    pub fn standard() -> Self {
        Self::new(PolicyRuleSet::standard())
    }

    pub fn rules(&self) -> &PolicyRuleSet {
        &self.rules
    }

    /// Evaluate every rule in table order and build the final output.
    pub fn evaluate(
        &self,
        input: &ReleaseInput,
        context: &Context,
        candidate: &CandidateAssessment,
    ) -> ReleaseOutput {
        let mut fired_rules: Vec<FiredRule> = Vec::new();
        let mut advisories: Vec<FiredRule> = Vec::new();

        for rule in &self.rules.rules {
            if let Some(fired) = rule.check(input, context, candidate) {
                match rule.effect() {
                    RuleEffect::ForceNoGo => fired_rules.push(fired),
                    RuleEffect::Advise => advisories.push(fired),
                }
            }
        }

        let mut decision = candidate.decision;
        let mut risk_factors = candidate.risk_factors.clone();
        let mut recommended_actions = candidate.recommended_actions.clone();
        let mut score = candidate.risk_score;
        let mut score_substituted = false;

        if !fired_rules.is_empty() {
            decision = Decision::NoGo;
            for fired in &fired_rules {
                push_factor(
                    &mut risk_factors,
                    RiskFactor::new(POLICY_CATEGORY, fired.rationale.clone(), RiskLevel::Critical),
                );
            }
            if !is_valid_score(score) {
                score = SUBSTITUTE_SCORE;
                score_substituted = true;
            }
        } else if !score.is_finite() {
            // Reachable only with a rule set lacking the score rules.
            score = SUBSTITUTE_SCORE;
            score_substituted = true;
        }

        for advisory in &advisories {
            let action = advisory_action(advisory);
            if !recommended_actions.contains(&action) {
                recommended_actions.push(action);
            }
        }

        let clamped = score.clamp(0.0, 1.0);
        let score_clamped = clamped != score;
        let score = clamped;

        if decision == Decision::NoGo && risk_factors.is_empty() {
            risk_factors.push(RiskFactor::new(
                POLICY_CATEGORY,
                UNEXPLAINED_NO_GO,
                RiskLevel::High,
            ));
        }

        let overridden = candidate.decision == Decision::Go && decision == Decision::NoGo;

        ReleaseOutput {
            decision,
            risk_level: RiskLevel::from_score(score),
            risk_score: score,
            risk_factors,
            recommended_actions,
            summary: candidate.summary.clone(),
            explanation: candidate.explanation.clone(),
            conditions: candidate.conditions.clone(),
            provenance: Provenance {
                model_decision: candidate.decision,
                overridden,
                fired_rules,
                advisories,
                score_substituted,
                score_clamped,
                input_digest: input.digest(),
            },
        }
    }
}

/// Render an advisory as a recommended action line.
pub fn advisory_action(fired: &FiredRule) -> String {
    match &fired.detail {
        Some(detail) => format!("[POLICY: {}] {}: {}", fired.rule, fired.rationale, detail),
        None => format!("[POLICY: {}] {}", fired.rule, fired.rationale),
    }
}

fn push_factor(factors: &mut Vec<RiskFactor>, factor: RiskFactor) {
    if !factors
        .iter()
        .any(|f| f.description == factor.description)
    {
        factors.push(factor);
    }
}
