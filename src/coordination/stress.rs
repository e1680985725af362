use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use super::trial::{TrialBody, TrialReference, TrialResult, Verdict, stdin_text};
use crate::compare::ComparisonStrategy;
use crate::exec::{ExecutionOutcome, ProcessRunner};
use crate::telemetry::SessionEvent;

/// Generator → candidate + oracle → compare, one trial per index
pub struct StressTrial {
    pub runner: ProcessRunner,
    pub candidate: PathBuf,
    pub oracle: PathBuf,
    pub generator: PathBuf,
    pub timeout: Duration,
    pub comparison: ComparisonStrategy,
}

impl StressTrial {
    pub fn new(candidate: PathBuf, oracle: PathBuf, generator: PathBuf, timeout: Duration) -> Self {
        Self {
            runner: ProcessRunner::new(),
            candidate,
            oracle,
            generator,
            timeout,
            comparison: ComparisonStrategy::ExactTextEquality,
        }
    }

    async fn generate(&self) -> Result<String, String> {
        match self.runner.run(&self.generator, "", None).await {
            Ok(ExecutionOutcome::Completed { output, .. }) => Ok(output),
            Ok(outcome) => Err(format!("generator {}", outcome.diagnostic())),
            Err(e) => Err(format!("{:#}", e)),
        }
    }
}

/// Verdict for a pair of executions on the same input
///
/// A program that did not complete takes precedence over a mismatch; the
/// candidate is blamed before the oracle.
pub fn judge(
    comparison: ComparisonStrategy,
    candidate: &ExecutionOutcome,
    oracle: &ExecutionOutcome,
) -> Verdict {
    match (candidate.output(), oracle.output()) {
        (None, _) => Verdict::Fail {
            diagnostic: Some(format!("candidate: {}", candidate.diagnostic())),
        },
        (_, None) => Verdict::Fail {
            diagnostic: Some(format!("oracle: {}", oracle.diagnostic())),
        },
        (Some(actual), Some(expected)) if comparison.outputs_match(expected, actual) => {
            Verdict::Pass
        }
        (Some(_), Some(_)) => Verdict::Fail { diagnostic: None },
    }
}

#[async_trait]
impl TrialBody for StressTrial {
    async fn run_trial(&self, index: usize) -> TrialResult {
        let input = match self.generate().await {
            Ok(input) => input,
            Err(message) => return TrialResult::infrastructure(index, "", message),
        };

        let stdin = stdin_text(&input);
        let (candidate, oracle) = tokio::join!(
            self.runner.run(&self.candidate, &stdin, Some(self.timeout)),
            self.runner.run(&self.oracle, &stdin, Some(self.timeout)),
        );
        let (candidate, oracle) = match (candidate, oracle) {
            (Ok(candidate), Ok(oracle)) => (candidate, oracle),
            (Err(e), _) | (_, Err(e)) => {
                return TrialResult::infrastructure(index, input, format!("{:#}", e));
            }
        };

        TrialResult {
            index,
            verdict: judge(self.comparison, &candidate, &oracle),
            input,
            candidate: Some(candidate),
            reference: TrialReference::Oracle(oracle),
        }
    }

    fn completion_event(&self, result: &TrialResult) -> Option<SessionEvent> {
        result
            .verdict
            .is_pass()
            .then_some(SessionEvent::Pass { index: result.index })
    }
}
