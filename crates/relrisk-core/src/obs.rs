//! Structured lifecycle events for assessments.
//!
//! Every event carries an `event` field so that log pipelines can filter on
//! it, e.g. `event=policy.evaluated`.

use tracing::{info, warn};

use crate::domain::{AssessmentStage, AttemptError, ReleaseOutput};

/// RAII guard that enters an assessment-scoped span.
///
/// Not `Send`; inside async code use [`assessment_span`] with
/// `tracing::Instrument` instead.
pub struct AssessmentSpan {
    _span: tracing::span::EnteredSpan,
}

impl AssessmentSpan {
    pub fn enter(assessment_id: &str, repo: &str, pr_number: u64) -> Self {
        Self {
            _span: assessment_span(assessment_id, repo, pr_number).entered(),
        }
    }
}

/// The `relrisk.assessment` span, not yet entered.
pub fn assessment_span(assessment_id: &str, repo: &str, pr_number: u64) -> tracing::Span {
    tracing::info_span!(
        "relrisk.assessment",
        assessment_id = %assessment_id,
        repo = %repo,
        pr_number = pr_number,
    )
}

pub fn emit_assessment_started(assessment_id: &str, repo: &str, pr_number: u64) {
    info!(
        event = "assessment.started",
        assessment_id = %assessment_id,
        repo = %repo,
        pr_number = pr_number,
    );
}

/// Stage transition.
pub fn emit_stage(assessment_id: &str, stage: AssessmentStage, attempt: u32) {
    info!(
        event = "assessment.stage",
        assessment_id = %assessment_id,
        stage = %stage,
        attempt = attempt,
    );
}

/// A model attempt failed and may be retried (warning level).
pub fn emit_attempt_failed(assessment_id: &str, attempt: u32, max_attempts: u32, error: &AttemptError) {
    warn!(
        event = "model.attempt_failed",
        assessment_id = %assessment_id,
        attempt = attempt,
        max_attempts = max_attempts,
        stage = %error.stage(),
        error = %error,
    );
}

pub fn emit_policy_evaluated(assessment_id: &str, output: &ReleaseOutput) {
    info!(
        event = "policy.evaluated",
        assessment_id = %assessment_id,
        decision = %output.decision,
        model_decision = %output.provenance.model_decision,
        overridden = output.provenance.overridden,
        fired_rules = ?output.provenance.fired_rule_names(),
        advisories = output.provenance.advisories.len(),
        risk_score = output.risk_score,
    );
}

pub fn emit_assessment_finished(
    assessment_id: &str,
    duration_ms: u64,
    attempts: u32,
    output: &ReleaseOutput,
) {
    info!(
        event = "assessment.finished",
        assessment_id = %assessment_id,
        duration_ms = duration_ms,
        attempts = attempts,
        decision = %output.decision,
        risk_level = output.risk_level.as_str(),
    );
}

/// Terminal failure (warning level).
pub fn emit_assessment_failed(assessment_id: &str, duration_ms: u64, error: &dyn std::fmt::Display) {
    warn!(
        event = "assessment.failed",
        assessment_id = %assessment_id,
        duration_ms = duration_ms,
        error = %error,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assessment_span_enter() {
        let _span = AssessmentSpan::enter("a-1", "myorg/api", 3);
    }
}
