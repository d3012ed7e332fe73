//! Externally assembled facts about a release.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::release::CiCheck;

/// Pull request metadata as reported by the code host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PullRequestMeta {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub base_ref: Option<String>,
    #[serde(default)]
    pub head_ref: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Read-only aggregation of external facts, owned by one assessment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Context {
    /// CI check outcomes gathered for the change.
    #[serde(default)]
    pub ci_checks: Vec<CiCheck>,
    /// Recent incident descriptions relevant to the repository.
    #[serde(default)]
    pub incidents: Vec<String>,
    #[serde(default)]
    pub pull_request: Option<PullRequestMeta>,
    pub assembled_at: DateTime<Utc>,
}

impl Context {
    /// Context with no external facts.
    pub fn empty() -> Self {
        Self {
            ci_checks: Vec::new(),
            incidents: Vec::new(),
            pull_request: None,
            assembled_at: Utc::now(),
        }
    }

    pub fn with_ci(mut self, checks: Vec<CiCheck>) -> Self {
        self.ci_checks = checks;
        self
    }

    pub fn with_incidents(mut self, incidents: Vec<String>) -> Self {
        self.incidents = incidents;
        self
    }

    pub fn with_pull_request(mut self, pr: PullRequestMeta) -> Self {
        self.pull_request = Some(pr);
        self
    }

    pub fn ci_failed(&self) -> bool {
        self.ci_checks.iter().any(|c| !c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&str> {
        self.ci_checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context_has_no_failures() {
        let ctx = Context::empty();
        assert!(!ctx.ci_failed());
        assert!(ctx.failed_checks().is_empty());
        assert!(ctx.pull_request.is_none());
    }

    #[test]
    fn test_context_ci_failure() {
        let ctx = Context::empty().with_ci(vec![
            CiCheck::passed("build"),
            CiCheck::failed("security-scan", "CVE found"),
        ]);
        assert!(ctx.ci_failed());
        assert_eq!(ctx.failed_checks(), vec!["security-scan"]);
    }
}
