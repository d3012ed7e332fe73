//! Release under review.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::InputError;

fn default_deployment_target() -> String {
    "production".to_string()
}

/// A single file changed in the release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChange {
    /// Path relative to the repository root.
    pub path: String,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
    /// Diff content for this file (may be truncated upstream).
    #[serde(default)]
    pub patch: String,
}

impl FileChange {
    pub fn new(path: impl Into<String>, additions: u32, deletions: u32) -> Self {
        Self {
            path: path.into(),
            additions,
            deletions,
            patch: String::new(),
        }
    }
}

/// Outcome of one CI check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CiCheck {
    pub name: String,
    pub passed: bool,
    #[serde(default)]
    pub details: String,
}

impl CiCheck {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            details: String::new(),
        }
    }

    pub fn failed(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            details: details.into(),
        }
    }
}

/// Immutable description of the change being assessed.
///
/// Constructed once per assessment request and never mutated by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseInput {
    /// Repository identifier, e.g. `myorg/api`.
    pub repo: String,
    pub pr_number: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub author: String,
    #[serde(default)]
    pub files_changed: Vec<FileChange>,
    #[serde(default)]
    pub ci_results: Vec<CiCheck>,
    #[serde(default)]
    pub commit_messages: Vec<String>,
    #[serde(default)]
    pub recent_incidents: Vec<String>,
    #[serde(default = "default_deployment_target")]
    pub deployment_target: String,
}

impl ReleaseInput {
    /// Minimal input with a single commit message, mostly useful as a
    /// starting point for builders and tests.
    pub fn new(repo: impl Into<String>, pr_number: u64, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            repo: repo.into(),
            pr_number,
            commit_messages: vec![title.clone()],
            title,
            description: String::new(),
            author: "unknown".to_string(),
            files_changed: Vec::new(),
            ci_results: Vec::new(),
            recent_incidents: Vec::new(),
            deployment_target: default_deployment_target(),
        }
    }

    pub fn with_files(mut self, files: Vec<FileChange>) -> Self {
        self.files_changed = files;
        self
    }

    pub fn with_ci(mut self, checks: Vec<CiCheck>) -> Self {
        self.ci_results = checks;
        self
    }

    pub fn with_incidents(mut self, incidents: Vec<String>) -> Self {
        self.recent_incidents = incidents;
        self
    }

    /// Structural validation performed before the input reaches the core.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.repo.trim().is_empty() {
            return Err(InputError::EmptyField("repo"));
        }
        if self.title.trim().is_empty() {
            return Err(InputError::EmptyField("title"));
        }
        if self.author.trim().is_empty() {
            return Err(InputError::EmptyField("author"));
        }
        if self.pr_number == 0 {
            return Err(InputError::InvalidPrNumber);
        }
        if self.files_changed.is_empty() && self.commit_messages.is_empty() {
            return Err(InputError::NoContent);
        }
        Ok(())
    }

    /// CI outcome signal: true when any reported check failed.
    pub fn ci_failed(&self) -> bool {
        self.ci_results.iter().any(|c| !c.passed)
    }

    /// Names of failed CI checks, in reported order.
    pub fn failed_checks(&self) -> Vec<&str> {
        self.ci_results
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Total lines added and deleted across all files.
    pub fn total_lines_changed(&self) -> u64 {
        self.files_changed
            .iter()
            .map(|f| u64::from(f.additions) + u64::from(f.deletions))
            .sum()
    }

    /// SHA-256 hex digest of the canonical JSON encoding.
    pub fn digest(&self) -> String {
        // Serializing a plain struct of strings and integers cannot fail.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_target_defaults_to_production() {
        let json = r#"{"repo":"myorg/api","pr_number":7,"title":"t","author":"a","commit_messages":["x"]}"#;
        let input: ReleaseInput = serde_json::from_str(json).expect("deserialize");
        assert_eq!(input.deployment_target, "production");
        assert!(input.files_changed.is_empty());
    }

    #[test]
    fn test_validate_rejects_empty_release() {
        let mut input = ReleaseInput::new("myorg/api", 1, "Empty");
        input.commit_messages.clear();
        assert!(matches!(input.validate(), Err(InputError::NoContent)));
    }

    #[test]
    fn test_validate_rejects_zero_pr_number() {
        let input = ReleaseInput::new("myorg/api", 0, "Fix");
        assert!(matches!(input.validate(), Err(InputError::InvalidPrNumber)));
    }

    #[test]
    fn test_validate_rejects_blank_title() {
        let mut input = ReleaseInput::new("myorg/api", 3, "Fix");
        input.title = "   ".to_string();
        assert!(matches!(input.validate(), Err(InputError::EmptyField("title"))));
    }

    #[test]
    fn test_ci_failed_and_failed_checks() {
        let input = ReleaseInput::new("myorg/api", 1, "Fix").with_ci(vec![
            CiCheck::passed("lint"),
            CiCheck::failed("unit-tests", "2 failures"),
            CiCheck::failed("e2e", ""),
        ]);
        assert!(input.ci_failed());
        assert_eq!(input.failed_checks(), vec!["unit-tests", "e2e"]);
    }

    #[test]
    fn test_total_lines_changed() {
        let input = ReleaseInput::new("myorg/api", 1, "Fix").with_files(vec![
            FileChange::new("src/a.rs", 10, 2),
            FileChange::new("src/b.rs", 5, 0),
        ]);
        assert_eq!(input.total_lines_changed(), 17);
    }

    #[test]
    fn test_digest_is_stable_and_content_sensitive() {
        let a = ReleaseInput::new("myorg/api", 1, "Fix");
        let b = ReleaseInput::new("myorg/api", 1, "Fix");
        let c = ReleaseInput::new("myorg/api", 2, "Fix");
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 64);
    }
}
