use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::coordinator::{Mode, SessionVerdict};
use super::trial::TrialResult;
use crate::config::{CANDIDATE_LOG, INPUTS_LOG, REFERENCE_LOG, SESSION_SUMMARY};

/// The `session.json` file written when a session ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub mode: Mode,
    pub started_at: String,  // RFC 3339
    pub finished_at: String, // RFC 3339
    pub trials_attempted: usize,
    pub trials_passed: usize,
    pub verdict: SessionVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failing_index: Option<usize>,
}

/// Trait for persisting the cumulative logs of a session
///
/// Logs are written once, after every worker has stopped.
#[async_trait::async_trait]
pub trait TrialLogStorage: Send + Sync {
    /// Write the inputs, reference and candidate logs for all executed trials
    async fn write_trials(&self, results: &[TrialResult]) -> Result<()>;

    async fn write_summary(&self, summary: &SessionSummary) -> Result<()>;

    async fn read_summary(&self) -> Result<SessionSummary>;

    /// Where the logs end up, for reporting
    fn location(&self) -> &Path;
}

/// Local filesystem implementation of TrialLogStorage
///
/// Directory structure:
///   {log_dir}/inputs.txt
///   {log_dir}/reference.txt
///   {log_dir}/candidate.txt
///   {log_dir}/session.json
pub struct LocalTrialLogStorage {
    log_dir: PathBuf,
}

impl LocalTrialLogStorage {
    pub fn new(log_dir: PathBuf) -> Self {
        Self { log_dir }
    }

    fn summary_path(&self) -> PathBuf {
        self.log_dir.join(SESSION_SUMMARY)
    }

    async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.log_dir)
            .await
            .with_context(|| format!("Failed to create log directory {}", self.log_dir.display()))
    }
}

/// Render one log file: every entry under a `=== trial N ===` header
///
/// `results` must already be sorted by index.
pub fn render_log(results: &[TrialResult], text: impl Fn(&TrialResult) -> String) -> String {
    let mut log = String::new();
    for result in results {
        log.push_str(&format!("=== trial {} ===\n", result.index));
        let entry = text(result);
        log.push_str(&entry);
        if !entry.ends_with('\n') {
            log.push('\n');
        }
    }
    log
}

#[async_trait::async_trait]
impl TrialLogStorage for LocalTrialLogStorage {
    async fn write_trials(&self, results: &[TrialResult]) -> Result<()> {
        self.ensure_dir().await?;

        let logs = [
            (INPUTS_LOG, render_log(results, |r| r.input.clone())),
            (REFERENCE_LOG, render_log(results, TrialResult::expected_text)),
            (CANDIDATE_LOG, render_log(results, TrialResult::actual_text)),
        ];
        for (name, contents) in logs {
            fs::write(self.log_dir.join(name), contents)
                .await
                .with_context(|| format!("Failed to write {}", name))?;
        }

        Ok(())
    }

    async fn write_summary(&self, summary: &SessionSummary) -> Result<()> {
        self.ensure_dir().await?;

        let json =
            serde_json::to_string_pretty(summary).context("Failed to serialize session summary")?;
        fs::write(self.summary_path(), json)
            .await
            .context("Failed to write session summary")?;

        Ok(())
    }

    async fn read_summary(&self) -> Result<SessionSummary> {
        let contents = fs::read_to_string(self.summary_path())
            .await
            .context("Failed to read session summary")?;

        serde_json::from_str(&contents).context("Failed to parse session summary")
    }

    fn location(&self) -> &Path {
        &self.log_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::trial::{TrialReference, Verdict};
    use crate::exec::ExecutionOutcome;
    use tempfile::TempDir;

    fn results() -> Vec<TrialResult> {
        vec![
            TrialResult {
                index: 1,
                input: "3\n1 2 3".to_string(),
                candidate: Some(ExecutionOutcome::Completed {
                    output: "6".to_string(),
                    exit_code: 0,
                }),
                reference: TrialReference::Oracle(ExecutionOutcome::Completed {
                    output: "6".to_string(),
                    exit_code: 0,
                }),
                verdict: Verdict::Pass,
            },
            TrialResult {
                index: 2,
                input: "1\n5".to_string(),
                candidate: Some(ExecutionOutcome::NoOutputProduced),
                reference: TrialReference::Oracle(ExecutionOutcome::Completed {
                    output: "5".to_string(),
                    exit_code: 0,
                }),
                verdict: Verdict::Fail {
                    diagnostic: Some("candidate: produced no output".to_string()),
                },
            },
        ]
    }

    #[test]
    fn test_render_log_delimits_by_index() {
        let log = render_log(&results(), TrialResult::actual_text);

        assert_eq!(
            log,
            "=== trial 1 ===\n6\n=== trial 2 ===\n<produced no output>\n"
        );
    }

    #[tokio::test]
    async fn test_write_trials_creates_all_logs() {
        let dir = TempDir::new().unwrap();
        let storage = LocalTrialLogStorage::new(dir.path().join("logs"));

        storage.write_trials(&results()).await.unwrap();

        let inputs = std::fs::read_to_string(dir.path().join("logs").join(INPUTS_LOG)).unwrap();
        let reference =
            std::fs::read_to_string(dir.path().join("logs").join(REFERENCE_LOG)).unwrap();
        assert_eq!(inputs, "=== trial 1 ===\n3\n1 2 3\n=== trial 2 ===\n1\n5\n");
        assert_eq!(reference, "=== trial 1 ===\n6\n=== trial 2 ===\n5\n");
        assert!(dir.path().join("logs").join(CANDIDATE_LOG).exists());
    }

    #[tokio::test]
    async fn test_summary_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = LocalTrialLogStorage::new(dir.path().to_path_buf());
        let summary = SessionSummary {
            session_id: "7f1c0e1a-0000-4000-8000-000000000000".to_string(),
            mode: Mode::Stress,
            started_at: "2026-01-05T10:00:00Z".to_string(),
            finished_at: "2026-01-05T10:00:03Z".to_string(),
            trials_attempted: 2,
            trials_passed: 1,
            verdict: SessionVerdict::Failed { index: 2 },
            failing_index: Some(2),
        };

        storage.write_summary(&summary).await.unwrap();
        let json = std::fs::read_to_string(dir.path().join(SESSION_SUMMARY)).unwrap();
        assert!(json.contains("\"mode\": \"stress\""));
        assert!(json.contains("\"status\": \"failed\""));

        assert_eq!(storage.read_summary().await.unwrap(), summary);
    }
}
