//! Error taxonomy for the assessment pipeline.
//!
//! - [`ContextError`] and [`RenderError`] are fatal: no retry.
//! - [`ModelError`] and [`ParseError`] are retried inside the model loop.
//! - [`AssessmentError`] is terminal and carries the underlying cause.

use serde::{Deserialize, Serialize};

use super::stage::AssessmentStage;

/// Release input rejected before reaching the core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("field must not be empty: {0}")]
    EmptyField(&'static str),

    #[error("pr_number must be greater than zero")]
    InvalidPrNumber,

    #[error("release must have at least one of files_changed or commit_messages")]
    NoContent,
}

/// Upstream facts could not be assembled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context source unavailable: {0}")]
    Unavailable(String),

    #[error("context source {source_name} failed: {reason}")]
    Source { source_name: String, reason: String },

    #[error("context assembly timed out after {0}ms")]
    Timeout(u64),
}

/// The prompt renderer could not produce a prompt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("prompt rendering failed: {0}")]
pub struct RenderError(pub String);

/// A model call failed. Every variant is treated as transient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelError {
    #[error("model call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("model transport error: {message}")]
    Transport { message: String },

    #[error("model rate limited")]
    RateLimited,

    #[error("model API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model returned no content")]
    EmptyResponse,

    #[error("invalid model configuration: {message}")]
    InvalidConfig { message: String },
}

/// Model output was not a well-formed assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseError {
    #[error("response is not valid JSON: {message}")]
    InvalidJson { message: String },

    #[error("response must be a JSON object")]
    NotAnObject,

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid decision {value:?}; expected GO or NO_GO")]
    InvalidDecision { value: String },

    #[error("risk_score is not numeric: {value}")]
    NonNumericScore { value: String },

    #[error("risk_score {value} outside [0.0, 1.0]")]
    ScoreOutOfRange { value: f64 },

    #[error("invalid risk_level {value:?}")]
    InvalidRiskLevel { value: String },

    #[error("malformed field {field}: {reason}")]
    MalformedField { field: String, reason: String },

    #[error("NO_GO decision without any risk factors")]
    UnexplainedNoGo,
}

/// Failure of a single model attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", content = "error", rename_all = "snake_case")]
pub enum AttemptError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl AttemptError {
    /// Stage the failure surfaced in.
    pub fn stage(&self) -> AssessmentStage {
        match self {
            AttemptError::Model(_) => AssessmentStage::CallingModel,
            AttemptError::Parse(_) => AssessmentStage::Parsing,
        }
    }
}

/// One recorded failed attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptFailure {
    /// 1-based attempt number.
    pub attempt: u32,
    pub stage: AssessmentStage,
    pub error: AttemptError,
}

/// Terminal failure of an assessment request.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("context assembly failed: {0}")]
    Context(#[from] ContextError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("model retries exhausted after {} attempt(s): {last}", .attempts.len())]
    RetriesExhausted {
        attempts: Vec<AttemptFailure>,
        #[source]
        last: AttemptError,
    },

    #[error("assessment cancelled during {stage}")]
    Cancelled { stage: AssessmentStage },

    #[error("invalid assessor configuration: {0}")]
    InvalidConfig(String),
}

impl AssessmentError {
    /// Failed attempts recorded before the request gave up.
    pub fn attempts(&self) -> &[AttemptFailure] {
        match self {
            AssessmentError::RetriesExhausted { attempts, .. } => attempts,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_display_counts_attempts() {
        let last = AttemptError::Model(ModelError::RateLimited);
        let attempts = (1..=3)
            .map(|attempt| AttemptFailure {
                attempt,
                stage: AssessmentStage::CallingModel,
                error: last.clone(),
            })
            .collect();
        let err = AssessmentError::RetriesExhausted { attempts, last };
        let msg = err.to_string();
        assert!(msg.contains("3 attempt(s)"), "{msg}");
        assert!(msg.contains("rate limited"), "{msg}");
        assert_eq!(err.attempts().len(), 3);
    }

    #[test]
    fn test_attempt_error_stage() {
        let model: AttemptError = ModelError::EmptyResponse.into();
        let parse: AttemptError = ParseError::NotAnObject.into();
        assert_eq!(model.stage(), AssessmentStage::CallingModel);
        assert_eq!(parse.stage(), AssessmentStage::Parsing);
    }

    #[test]
    fn test_context_error_display() {
        let err = ContextError::Source {
            source_name: "incidents".into(),
            reason: "permission denied".into(),
        };
        assert!(err.to_string().contains("incidents"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::InvalidDecision {
            value: "MAYBE".into(),
        };
        assert!(err.to_string().contains("MAYBE"));
    }
}
