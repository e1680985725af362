use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use super::trial::{TrialBody, TrialReference, TrialResult, Verdict, stdin_text};
use crate::compare::ComparisonStrategy;
use crate::exec::ProcessRunner;
use crate::problem::Sample;
use crate::telemetry::SessionEvent;

/// Replays fixed (input, expected) pairs against the candidate
///
/// Trial `i` runs `samples[i - 1]`.
pub struct SampleTrial {
    pub runner: ProcessRunner,
    pub candidate: PathBuf,
    pub samples: Vec<Sample>,
    pub timeout: Duration,
    pub comparison: ComparisonStrategy,
}

impl SampleTrial {
    pub fn new(candidate: PathBuf, samples: Vec<Sample>, timeout: Duration) -> Self {
        Self {
            runner: ProcessRunner::new(),
            candidate,
            samples,
            timeout,
            comparison: ComparisonStrategy::IntegerTokenEquality,
        }
    }
}

#[async_trait]
impl TrialBody for SampleTrial {
    async fn run_trial(&self, index: usize) -> TrialResult {
        let Some(sample) = index.checked_sub(1).and_then(|i| self.samples.get(i)) else {
            return TrialResult::infrastructure(index, "", format!("no sample {}", index));
        };

        let outcome = match self
            .runner
            .run(&self.candidate, &stdin_text(&sample.input), Some(self.timeout))
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return TrialResult::infrastructure(index, &sample.input, format!("{:#}", e)),
        };

        let verdict = match outcome.output() {
            Some(actual) if self.comparison.outputs_match(&sample.output, actual) => Verdict::Pass,
            Some(_) => Verdict::Fail { diagnostic: None },
            None => Verdict::Fail {
                diagnostic: Some(format!("candidate: {}", outcome.diagnostic())),
            },
        };

        TrialResult {
            index,
            input: sample.input.clone(),
            candidate: Some(outcome),
            reference: TrialReference::Expected(sample.output.clone()),
            verdict,
        }
    }

    fn completion_event(&self, result: &TrialResult) -> Option<SessionEvent> {
        if matches!(result.verdict, Verdict::InfrastructureError { .. }) {
            return None;
        }
        Some(SessionEvent::Sample {
            index: result.index,
            input: result.input.clone(),
            expected: result.expected_text(),
            actual: result.actual_text(),
            passed: result.verdict.is_pass(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::exec::ExecutionOutcome;
    use crate::test_support::write_script;
    use tempfile::TempDir;

    fn sample(input: &str, output: &str) -> Sample {
        Sample {
            input: input.to_string(),
            output: output.to_string(),
        }
    }

    #[tokio::test]
    async fn test_loose_comparison_passes() {
        let dir = TempDir::new().unwrap();
        let candidate = write_script(&dir, "solution", "echo '0, 1'");
        let body = SampleTrial::new(
            candidate,
            vec![sample("[1,2]\n3", "[0,1]")],
            Duration::from_secs(5),
        );

        let result = body.run_trial(1).await;

        assert_eq!(result.verdict, Verdict::Pass);
        assert_eq!(
            body.completion_event(&result),
            Some(SessionEvent::Sample {
                index: 1,
                input: "[1,2]\n3".to_string(),
                expected: "[0,1]".to_string(),
                actual: "0, 1".to_string(),
                passed: true,
            })
        );
    }

    #[tokio::test]
    async fn test_wrong_answer_fails_without_diagnostic() {
        let dir = TempDir::new().unwrap();
        let candidate = write_script(&dir, "solution", "echo 7");
        let body = SampleTrial::new(candidate, vec![sample("1", "8")], Duration::from_secs(5));

        let result = body.run_trial(1).await;

        assert_eq!(result.verdict, Verdict::Fail { diagnostic: None });
        assert!(matches!(
            body.completion_event(&result),
            Some(SessionEvent::Sample { passed: false, .. })
        ));
    }

    #[tokio::test]
    async fn test_crash_fails_with_diagnostic() {
        let dir = TempDir::new().unwrap();
        let candidate = write_script(&dir, "solution", "echo boom >&2\nexit 2");
        let body = SampleTrial::new(candidate, vec![sample("1", "1")], Duration::from_secs(5));

        let result = body.run_trial(1).await;

        assert_eq!(
            result.verdict,
            Verdict::Fail {
                diagnostic: Some("candidate: exited with code 2: boom".to_string())
            }
        );
        assert!(matches!(
            result.candidate,
            Some(ExecutionOutcome::Crashed { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_candidate_is_infrastructure_error() {
        let dir = TempDir::new().unwrap();
        let body = SampleTrial::new(
            dir.path().join("absent"),
            vec![sample("1", "1")],
            Duration::from_secs(5),
        );

        let result = body.run_trial(1).await;

        assert!(matches!(
            result.verdict,
            Verdict::InfrastructureError { .. }
        ));
        assert_eq!(body.completion_event(&result), None);
    }
}
