//! Domain types for release-risk assessment.

pub mod assessment;
pub mod context;
pub mod error;
pub mod release;
pub mod stage;

pub use assessment::{
    CandidateAssessment, Decision, FiredRule, Provenance, ReleaseOutput, RiskFactor, RiskLevel,
};
pub use context::{Context, PullRequestMeta};
pub use error::{
    AssessmentError, AttemptError, AttemptFailure, ContextError, InputError, ModelError,
    ParseError, RenderError,
};
pub use release::{CiCheck, FileChange, ReleaseInput};
pub use stage::AssessmentStage;
