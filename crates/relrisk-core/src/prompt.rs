//! Default prompt renderer.

use std::fmt::Write as _;

use crate::capability::{PromptRenderer, RenderedPrompt};
use crate::domain::{Context, ReleaseInput, RenderError};

const SYSTEM_PROMPT: &str = r#"You assess the risk of deploying a software change.
Act as a careful, pragmatic release engineer: block only for concrete reasons,
and name the files, checks or incidents that drive your judgment.

Consider file changes, CI outcomes, commit messages, recent incidents and the
deployment target together; combinations of risky areas compound.

Score calibration:
- 0.0-0.3 LOW: docs, tests, small isolated tweaks.
- 0.3-0.5 MEDIUM: business logic, flagged features, dependency bumps with coverage.
- 0.5-0.7 HIGH: migrations, auth, API contracts, billing. Clean CI mitigates.
- 0.7-1.0 CRITICAL: unrecoverable infrastructure changes, several high-risk
  areas at once, failing critical checks.

Decide GO when the risk is manageable (conditions allowed) and NO_GO when it is
not. A NO_GO must list at least one risk factor.

Respond with one JSON object and nothing else:
{
  "decision": "GO" | "NO_GO",
  "risk_score": <number between 0.0 and 1.0>,
  "risk_level": "LOW" | "MEDIUM" | "HIGH" | "CRITICAL",
  "summary": <string>,
  "risk_factors": [{"category": <string>, "description": <string>, "severity": "LOW" | "MEDIUM" | "HIGH" | "CRITICAL"}],
  "explanation": <string>,
  "conditions": [<string>],
  "recommended_actions": [<string>]
}"#;

/// Renders the built-in system and user prompts.
#[derive(Debug, Clone)]
pub struct TemplatePromptRenderer {
    /// Patches longer than this are truncated.
    pub max_patch_chars: usize,
    /// Rendering fails when the user prompt exceeds this size.
    pub max_prompt_chars: usize,
}

impl Default for TemplatePromptRenderer {
    fn default() -> Self {
        Self {
            max_patch_chars: 4_000,
            max_prompt_chars: 200_000,
        }
    }
}

impl TemplatePromptRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    fn user_prompt(&self, input: &ReleaseInput, context: &Context) -> String {
        let mut out = String::new();
        let additions: u64 = input.files_changed.iter().map(|f| u64::from(f.additions)).sum();
        let deletions: u64 = input.files_changed.iter().map(|f| u64::from(f.deletions)).sum();

        // Writing into a String cannot fail.
        let _ = writeln!(out, "Assess the risk of this release.\n");
        let _ = writeln!(out, "## Release");
        let _ = writeln!(out, "- Repository: {}", input.repo);
        let _ = writeln!(out, "- PR: #{}", input.pr_number);
        let _ = writeln!(out, "- Title: {}", input.title);
        let _ = writeln!(out, "- Author: {}", input.author);
        let _ = writeln!(out, "- Target: {}", input.deployment_target);
        if let Some(pr) = &context.pull_request {
            if let (Some(base), Some(head)) = (&pr.base_ref, &pr.head_ref) {
                let _ = writeln!(out, "- Branches: {head} -> {base}");
            }
            if !pr.labels.is_empty() {
                let _ = writeln!(out, "- Labels: {}", pr.labels.join(", "));
            }
        }

        let _ = writeln!(out, "\n## Description");
        if input.description.trim().is_empty() {
            let _ = writeln!(out, "(none)");
        } else {
            let _ = writeln!(out, "{}", input.description.trim());
        }

        let _ = writeln!(
            out,
            "\n## Files changed ({} files, +{additions}/-{deletions})",
            input.files_changed.len()
        );
        if input.files_changed.is_empty() {
            let _ = writeln!(out, "No file changes provided.");
        }
        for file in &input.files_changed {
            let _ = writeln!(out, "- `{}` (+{}/-{})", file.path, file.additions, file.deletions);
            if !file.patch.is_empty() {
                let _ = writeln!(out, "```diff\n{}\n```", self.truncate(&file.patch));
            }
        }

        let _ = writeln!(out, "\n## CI results");
        if context.ci_checks.is_empty() {
            let _ = writeln!(out, "No CI results provided.");
        }
        for check in &context.ci_checks {
            let status = if check.passed { "PASSED" } else { "FAILED" };
            if check.details.is_empty() {
                let _ = writeln!(out, "- {}: {status}", check.name);
            } else {
                let _ = writeln!(out, "- {}: {status} ({})", check.name, check.details);
            }
        }

        let _ = writeln!(out, "\n## Commit messages");
        if input.commit_messages.is_empty() {
            let _ = writeln!(out, "No commit messages provided.");
        }
        for message in &input.commit_messages {
            let _ = writeln!(out, "- {message}");
        }

        let _ = writeln!(out, "\n## Recent incidents");
        if context.incidents.is_empty() {
            let _ = writeln!(out, "No recent incidents.");
        }
        for incident in &context.incidents {
            let _ = writeln!(out, "- {incident}");
        }

        let _ = write!(out, "\nRespond with the JSON assessment.");
        out
    }

    fn truncate<'a>(&self, patch: &'a str) -> std::borrow::Cow<'a, str> {
        if patch.chars().count() <= self.max_patch_chars {
            return patch.into();
        }
        let head: String = patch.chars().take(self.max_patch_chars).collect();
        format!("{head}\n... (truncated)").into()
    }
}

impl PromptRenderer for TemplatePromptRenderer {
    fn render(&self, input: &ReleaseInput, context: &Context) -> Result<RenderedPrompt, RenderError> {
        let user = self.user_prompt(input, context);
        if user.len() > self.max_prompt_chars {
            return Err(RenderError(format!(
                "user prompt is {} bytes, limit {}",
                user.len(),
                self.max_prompt_chars
            )));
        }
        Ok(RenderedPrompt::new(SYSTEM_PROMPT, user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CiCheck, FileChange};

    fn input() -> ReleaseInput {
        ReleaseInput::new("myorg/api", 12, "Add session cache").with_files(vec![
            FileChange::new("src/session.rs", 40, 3),
            FileChange::new("tests/session.rs", 20, 0),
        ])
    }

    #[test]
    fn test_user_prompt_sections() {
        let ctx = Context::empty()
            .with_ci(vec![CiCheck::passed("build"), CiCheck::failed("e2e", "flaky login")])
            .with_incidents(vec!["[P1] INC-3: checkout errors".into()]);
        let prompt = TemplatePromptRenderer::new().render(&input(), &ctx).unwrap();

        assert!(prompt.user.contains("- PR: #12"));
        assert!(prompt.user.contains("(2 files, +60/-3)"));
        assert!(prompt.user.contains("- e2e: FAILED (flaky login)"));
        assert!(prompt.user.contains("- build: PASSED"));
        assert!(prompt.user.contains("[P1] INC-3: checkout errors"));
        assert!(prompt.system.contains("\"NO_GO\""));
    }

    #[test]
    fn test_empty_sections_have_placeholders() {
        let prompt = TemplatePromptRenderer::new()
            .render(&ReleaseInput::new("myorg/api", 1, "x"), &Context::empty())
            .unwrap();
        assert!(prompt.user.contains("No file changes provided."));
        assert!(prompt.user.contains("No CI results provided."));
        assert!(prompt.user.contains("No recent incidents."));
    }

    #[test]
    fn test_patch_truncated() {
        let mut file = FileChange::new("src/big.rs", 1, 0);
        file.patch = "x".repeat(50);
        let renderer = TemplatePromptRenderer {
            max_patch_chars: 10,
            ..TemplatePromptRenderer::default()
        };
        let input = ReleaseInput::new("myorg/api", 1, "x").with_files(vec![file]);
        let prompt = renderer.render(&input, &Context::empty()).unwrap();
        assert!(prompt.user.contains("xxxxxxxxxx\n... (truncated)"));
    }

    #[test]
    fn test_oversized_prompt_is_render_error() {
        let renderer = TemplatePromptRenderer {
            max_prompt_chars: 10,
            ..TemplatePromptRenderer::default()
        };
        assert!(renderer.render(&input(), &Context::empty()).is_err());
    }
}
