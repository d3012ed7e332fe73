//! Deterministic rule layer over model candidates.

pub mod config;
pub mod engine;
pub mod rules;

pub use config::{load_policy_config, load_rule_set, PolicyConfig, PolicyConfigError};
pub use engine::{advisory_action, PolicyEngine};
pub use rules::{PolicyRule, PolicyRuleSet, RuleEffect};
