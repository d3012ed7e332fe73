//! Assessment orchestration.
//!
//! Sequences context assembly, prompt rendering, the model call, parsing and
//! policy evaluation for one [`ReleaseInput`]:
//!
//! ```text
//! BuildingContext -> RenderingPrompt -> CallingModel -> Parsing -> Policy -> Done
//!                                            ^              |
//!                                            +--- retry ----+
//! ```
//!
//! Context and render failures are fatal. Model and parse failures are
//! retried with exponential backoff up to [`RetryPolicy::max_attempts`];
//! exhaustion fails with [`AssessmentError::RetriesExhausted`]. The policy
//! engine only ever sees a parsed candidate and is invoked exactly once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::capability::{ContextAssembler, ModelClient, PromptRenderer, RenderedPrompt};
use crate::domain::{
    AssessmentError, AssessmentStage, AttemptError, AttemptFailure, CandidateAssessment, Context,
    ContextError, ModelError, ReleaseInput, ReleaseOutput,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::parser::parse_candidate;
use crate::policy::PolicyEngine;

/// Retry, timeout and backoff settings for one assessor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total model attempts, including the first (must be >= 1).
    pub max_attempts: u32,
    /// Wall-clock limit for one model call (milliseconds).
    pub model_timeout_ms: u64,
    /// Wall-clock limit for context assembly (milliseconds).
    pub context_timeout_ms: u64,
    /// Base delay for exponential backoff between attempts (milliseconds).
    pub backoff_base_ms: u64,
    /// Upper bound on a single backoff delay (milliseconds).
    pub backoff_max_ms: u64,
    /// Append a repair instruction to the prompt after a parse failure.
    pub repair_prompt: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            model_timeout_ms: 60_000,
            context_timeout_ms: 30_000,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
            repair_prompt: true,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), AssessmentError> {
        if self.max_attempts == 0 {
            return Err(AssessmentError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }
        if self.model_timeout_ms == 0 || self.context_timeout_ms == 0 {
            return Err(AssessmentError::InvalidConfig(
                "timeouts must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let ms = self
            .backoff_base_ms
            .saturating_mul(factor)
            .min(self.backoff_max_ms);
        Duration::from_millis(ms)
    }
}

/// A successful assessment with its attempt log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TracedAssessment {
    pub assessment_id: String,
    pub output: ReleaseOutput,
    /// The context the prompt was rendered from.
    pub context: Context,
    /// Model attempts made, including the successful one.
    pub total_attempts: u32,
    /// Failed attempts that preceded the success.
    pub failed_attempts: Vec<AttemptFailure>,
    pub duration_ms: u64,
}

/// Runs the assessment pipeline against pluggable collaborators.
///
/// `Send + Sync`; share behind `Arc` across concurrent requests.
pub struct Assessor {
    context: Arc<dyn ContextAssembler>,
    renderer: Arc<dyn PromptRenderer>,
    model: Arc<dyn ModelClient>,
    policy: PolicyEngine,
    retry: RetryPolicy,
}

impl std::fmt::Debug for Assessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assessor")
            .field("policy", &self.policy)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Assessor {
    /// Assessor with the standard policy and default retry settings.
    pub fn new(
        context: impl ContextAssembler + 'static,
        renderer: impl PromptRenderer + 'static,
        model: impl ModelClient + 'static,
    ) -> Self {
        Self {
            context: Arc::new(context),
            renderer: Arc::new(renderer),
            model: Arc::new(model),
            policy: PolicyEngine::standard(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PolicyEngine) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Assess a release. The input is assumed to be validated already.
    pub async fn assess(&self, input: &ReleaseInput) -> Result<ReleaseOutput, AssessmentError> {
        self.assess_traced(input).await.map(|t| t.output)
    }

    /// Like [`Assessor::assess`], also returning the attempt log.
    pub async fn assess_traced(
        &self,
        input: &ReleaseInput,
    ) -> Result<TracedAssessment, AssessmentError> {
        self.run(input, &CancellationToken::new()).await
    }

    /// Like [`Assessor::assess`], aborting at the next await point once
    /// `cancel` fires. In-flight model calls and backoff sleeps are dropped.
    pub async fn assess_cancellable(
        &self,
        input: &ReleaseInput,
        cancel: &CancellationToken,
    ) -> Result<ReleaseOutput, AssessmentError> {
        self.run(input, cancel).await.map(|t| t.output)
    }

    async fn run(
        &self,
        input: &ReleaseInput,
        cancel: &CancellationToken,
    ) -> Result<TracedAssessment, AssessmentError> {
        self.retry.validate()?;

        let assessment_id = uuid::Uuid::new_v4().to_string();
        let span = obs::assessment_span(&assessment_id, &input.repo, input.pr_number);
        let started = Instant::now();

        METRICS.inc_started();
        obs::emit_assessment_started(&assessment_id, &input.repo, input.pr_number);

        let result = self
            .pipeline(&assessment_id, input, cancel)
            .instrument(span.clone())
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        span.in_scope(|| match result {
            Ok((output, context, total_attempts, failed_attempts)) => {
                METRICS.inc_completed();
                obs::emit_assessment_finished(&assessment_id, duration_ms, total_attempts, &output);
                Ok(TracedAssessment {
                    assessment_id,
                    output,
                    context,
                    total_attempts,
                    failed_attempts,
                    duration_ms,
                })
            }
            Err(err) => {
                METRICS.inc_failed();
                obs::emit_assessment_failed(&assessment_id, duration_ms, &err);
                Err(err)
            }
        })
    }

    async fn pipeline(
        &self,
        assessment_id: &str,
        input: &ReleaseInput,
        cancel: &CancellationToken,
    ) -> Result<(ReleaseOutput, Context, u32, Vec<AttemptFailure>), AssessmentError> {
        obs::emit_stage(assessment_id, AssessmentStage::BuildingContext, 0);
        let context = self.build_context(input, cancel).await?;

        obs::emit_stage(assessment_id, AssessmentStage::RenderingPrompt, 0);
        let prompt = self.renderer.render(input, &context)?;

        let (candidate, total_attempts, failed_attempts) =
            self.model_loop(assessment_id, &prompt, cancel).await?;

        obs::emit_stage(assessment_id, AssessmentStage::Policy, total_attempts);
        let output = self.policy.evaluate(input, &context, &candidate);
        if output.provenance.overridden {
            METRICS.inc_policy_overrides();
        }
        obs::emit_policy_evaluated(assessment_id, &output);

        obs::emit_stage(assessment_id, AssessmentStage::Done, total_attempts);
        Ok((output, context, total_attempts, failed_attempts))
    }

    async fn build_context(
        &self,
        input: &ReleaseInput,
        cancel: &CancellationToken,
    ) -> Result<Context, AssessmentError> {
        let limit_ms = self.retry.context_timeout_ms;
        let call = tokio::time::timeout(
            Duration::from_millis(limit_ms),
            self.context.build_context(input),
        );
        match guarded(cancel, AssessmentStage::BuildingContext, call).await? {
            Ok(result) => result.map_err(AssessmentError::Context),
            Err(_elapsed) => Err(AssessmentError::Context(ContextError::Timeout(limit_ms))),
        }
    }

    /// Bounded retry over the model-call-through-parse segment.
    async fn model_loop(
        &self,
        assessment_id: &str,
        base_prompt: &RenderedPrompt,
        cancel: &CancellationToken,
    ) -> Result<(CandidateAssessment, u32, Vec<AttemptFailure>), AssessmentError> {
        let max_attempts = self.retry.max_attempts;
        let timeout_ms = self.retry.model_timeout_ms;

        let mut attempt: u32 = 0;
        let mut last_error: Option<AttemptError> = None;
        let mut failures: Vec<AttemptFailure> = Vec::new();
        let mut prompt = base_prompt.clone();

        while attempt < max_attempts {
            attempt += 1;

            obs::emit_stage(assessment_id, AssessmentStage::CallingModel, attempt);
            METRICS.inc_model_attempts();
            let call = tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                self.model.complete(&prompt),
            );
            let completion = match guarded(cancel, AssessmentStage::CallingModel, call).await? {
                Ok(result) => result,
                Err(_elapsed) => Err(ModelError::Timeout { timeout_ms }),
            };

            let error = match completion {
                Ok(raw) => {
                    obs::emit_stage(assessment_id, AssessmentStage::Parsing, attempt);
                    match parse_candidate(&raw) {
                        Ok(candidate) => return Ok((candidate, attempt, failures)),
                        Err(parse_error) => {
                            METRICS.inc_parse_failures();
                            if self.retry.repair_prompt {
                                prompt = base_prompt.with_repair(&parse_error);
                            }
                            AttemptError::Parse(parse_error)
                        }
                    }
                }
                Err(model_error) => AttemptError::Model(model_error),
            };

            obs::emit_attempt_failed(assessment_id, attempt, max_attempts, &error);
            failures.push(AttemptFailure {
                attempt,
                stage: error.stage(),
                error: error.clone(),
            });
            last_error = Some(error);

            if attempt < max_attempts {
                let delay = self.retry.backoff(attempt);
                guarded(cancel, AssessmentStage::CallingModel, tokio::time::sleep(delay)).await?;
            }
        }

        match last_error {
            Some(last) => Err(AssessmentError::RetriesExhausted {
                attempts: failures,
                last,
            }),
            None => Err(AssessmentError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            )),
        }
    }
}

/// Race `fut` against cancellation.
async fn guarded<F: Future>(
    cancel: &CancellationToken,
    stage: AssessmentStage,
    fut: F,
) -> Result<F::Output, AssessmentError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AssessmentError::Cancelled { stage }),
        out = fut => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_defaults() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.model_timeout_ms, 60_000);
        assert_eq!(p.context_timeout_ms, 30_000);
        assert_eq!(p.backoff_base_ms, 500);
        assert!(p.repair_prompt);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let p = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert!(matches!(p.validate(), Err(AssessmentError::InvalidConfig(_))));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = RetryPolicy {
            backoff_base_ms: 500,
            backoff_max_ms: 3_000,
            ..RetryPolicy::default()
        };
        assert_eq!(p.backoff(1), Duration::from_millis(500));
        assert_eq!(p.backoff(2), Duration::from_millis(1_000));
        assert_eq!(p.backoff(3), Duration::from_millis(2_000));
        assert_eq!(p.backoff(4), Duration::from_millis(3_000));
        assert_eq!(p.backoff(60), Duration::from_millis(3_000));
    }

    #[test]
    fn test_retry_policy_partial_serde() {
        let p: RetryPolicy = serde_json::from_str(r#"{"max_attempts":5}"#).unwrap();
        assert_eq!(p.max_attempts, 5);
        assert_eq!(p.backoff_max_ms, 8_000);
    }
}
