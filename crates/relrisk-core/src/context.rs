//! Default context assembly.
//!
//! [`InputContextAssembler`] builds a [`Context`] from facts already carried
//! by the [`ReleaseInput`], optionally enriched from an [`IncidentSource`].
//! Fetching PR or CI data from remote systems is left to other assemblers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::ContextAssembler;
use crate::domain::{Context, ContextError, PullRequestMeta, ReleaseInput};

/// Default incident lookback window.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;

/// Source of recent incidents for a repository.
#[async_trait]
pub trait IncidentSource: Send + Sync {
    /// Short, human-readable descriptions of recent incidents for `repo`.
    async fn recent_incidents(&self, repo: &str) -> Result<Vec<String>, ContextError>;
}

/// One incident record in the JSON incident file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentRecord {
    pub id: String,
    pub title: String,
    pub severity: String,
    pub timestamp: DateTime<Utc>,
    pub repo: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub resolved: bool,
}

impl IncidentRecord {
    /// Format as `[<severity>] <id>: <title>`.
    pub fn summary(&self) -> String {
        format!("[{}] {}: {}", self.severity, self.id, self.title)
    }
}

/// Loads incidents from a local JSON array file.
///
/// Keeps unresolved incidents for the repository that started within the
/// lookback window. A missing file means no incidents.
#[derive(Debug, Clone)]
pub struct JsonIncidentLoader {
    path: PathBuf,
    lookback: Duration,
    now: Option<DateTime<Utc>>,
}

impl JsonIncidentLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lookback: Duration::days(DEFAULT_LOOKBACK_DAYS),
            now: None,
        }
    }

    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback = Duration::days(days);
        self
    }

    /// Pin the reference time instead of using the wall clock.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn source_error(&self, reason: impl std::fmt::Display) -> ContextError {
        ContextError::Source {
            source_name: format!("incidents:{}", self.path.display()),
            reason: reason.to_string(),
        }
    }

    /// Filter parsed records for `repo`.
    pub fn select(&self, records: &[IncidentRecord], repo: &str) -> Vec<String> {
        let now = self.now.unwrap_or_else(Utc::now);
        let cutoff = now - self.lookback;
        records
            .iter()
            .filter(|r| !r.resolved && r.repo == repo && r.timestamp >= cutoff)
            .map(IncidentRecord::summary)
            .collect()
    }
}

#[async_trait]
impl IncidentSource for JsonIncidentLoader {
    async fn recent_incidents(&self, repo: &str) -> Result<Vec<String>, ContextError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "incident file not found");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.source_error(e)),
        };
        let records: Vec<IncidentRecord> =
            serde_json::from_str(&content).map_err(|e| self.source_error(e))?;
        Ok(self.select(&records, repo))
    }
}

/// Builds context from the release input plus an optional incident source.
#[derive(Clone, Default)]
pub struct InputContextAssembler {
    incidents: Option<Arc<dyn IncidentSource>>,
}

impl std::fmt::Debug for InputContextAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputContextAssembler")
            .field("has_incident_source", &self.incidents.is_some())
            .finish()
    }
}

impl InputContextAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_incident_source(mut self, source: impl IncidentSource + 'static) -> Self {
        self.incidents = Some(Arc::new(source));
        self
    }

    /// Context derived from the input alone. Never fails.
    pub fn from_input(input: &ReleaseInput) -> Context {
        Context::empty()
            .with_ci(input.ci_results.clone())
            .with_incidents(input.recent_incidents.clone())
            .with_pull_request(PullRequestMeta {
                title: input.title.clone(),
                author: input.author.clone(),
                ..PullRequestMeta::default()
            })
    }
}

#[async_trait]
impl ContextAssembler for InputContextAssembler {
    async fn build_context(&self, input: &ReleaseInput) -> Result<Context, ContextError> {
        let mut context = Self::from_input(input);
        if let Some(source) = &self.incidents {
            for incident in source.recent_incidents(&input.repo).await? {
                if !context.incidents.contains(&incident) {
                    context.incidents.push(incident);
                }
            }
        }
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CiCheck;
    use chrono::TimeZone;

    fn record(id: &str, repo: &str, days_ago: i64, resolved: bool) -> IncidentRecord {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        IncidentRecord {
            id: id.into(),
            title: format!("{id} title"),
            severity: "P1".into(),
            timestamp: now - Duration::days(days_ago),
            repo: repo.into(),
            description: String::new(),
            resolved,
        }
    }

    #[test]
    fn test_select_filters_repo_window_and_resolved() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let loader = JsonIncidentLoader::new("unused.json").with_now(now);
        let records = vec![
            record("INC-1", "myorg/api", 1, false),
            record("INC-2", "myorg/api", 1, true),
            record("INC-3", "myorg/web", 1, false),
            record("INC-4", "myorg/api", 30, false),
        ];
        assert_eq!(loader.select(&records, "myorg/api"), vec!["[P1] INC-1: INC-1 title"]);
    }

    #[tokio::test]
    async fn test_missing_incident_file_is_empty() {
        let loader = JsonIncidentLoader::new("/nonexistent/relrisk/incidents.json");
        assert!(loader.recent_incidents("myorg/api").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_incident_file_is_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonIncidentLoader::new(&path)
            .recent_incidents("myorg/api")
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::Source { .. }));
    }

    #[tokio::test]
    async fn test_assembler_merges_input_and_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.json");
        let now = Utc::now();
        let records = vec![IncidentRecord {
            id: "INC-7".into(),
            title: "Queue backlog".into(),
            severity: "P2".into(),
            timestamp: now - Duration::hours(2),
            repo: "myorg/api".into(),
            description: String::new(),
            resolved: false,
        }];
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

        let assembler =
            InputContextAssembler::new().with_incident_source(JsonIncidentLoader::new(&path));
        let input = ReleaseInput::new("myorg/api", 5, "Bump deps")
            .with_ci(vec![CiCheck::passed("build")])
            .with_incidents(vec!["INC-1 elevated 5xx".into()]);
        let ctx = assembler.build_context(&input).await.unwrap();

        assert_eq!(ctx.ci_checks.len(), 1);
        assert_eq!(
            ctx.incidents,
            vec!["INC-1 elevated 5xx".to_string(), "[P2] INC-7: Queue backlog".to_string()]
        );
        assert_eq!(ctx.pull_request.unwrap().title, "Bump deps");
    }
}
