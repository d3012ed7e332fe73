//! relrisk core library.
//!
//! Model-backed release risk assessment with a deterministic policy backstop:
//! context -> prompt -> model -> strict parse -> policy -> [`ReleaseOutput`].

pub mod assessor;
pub mod capability;
pub mod context;
pub mod domain;
pub mod fakes;
pub mod metrics;
pub mod model;
pub mod obs;
pub mod parser;
pub mod policy;
pub mod prompt;
pub mod telemetry;

pub use assessor::{Assessor, RetryPolicy, TracedAssessment};
pub use capability::{ContextAssembler, ModelClient, PromptRenderer, RenderedPrompt};
pub use context::{IncidentRecord, IncidentSource, InputContextAssembler, JsonIncidentLoader};
pub use domain::{
    AssessmentError, AssessmentStage, AttemptError, AttemptFailure, CandidateAssessment, CiCheck,
    Context, ContextError, Decision, FileChange, FiredRule, InputError, ModelError, ParseError,
    Provenance, PullRequestMeta, ReleaseInput, ReleaseOutput, RenderError, RiskFactor, RiskLevel,
};
pub use model::{ModelConfig, OpenAiChatClient};
pub use obs::{
    emit_assessment_failed, emit_assessment_finished, emit_assessment_started,
    emit_attempt_failed, emit_policy_evaluated, emit_stage, AssessmentSpan,
};
pub use parser::parse_candidate;
pub use policy::{
    load_policy_config, load_rule_set, PolicyConfig, PolicyConfigError, PolicyEngine, PolicyRule,
    PolicyRuleSet, RuleEffect,
};
pub use prompt::TemplatePromptRenderer;

/// Crate version, as recorded in Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
