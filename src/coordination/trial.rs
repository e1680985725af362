use async_trait::async_trait;

use crate::exec::ExecutionOutcome;
use crate::telemetry::SessionEvent;

/// Verdict for a single trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// The candidate disagreed with the reference or did not complete
    Fail { diagnostic: Option<String> },
    /// The trial could not be evaluated at all; aborts the session
    InfrastructureError { message: String },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// What the candidate is judged against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialReference {
    /// Expected output of a fixed sample
    Expected(String),
    /// The oracle's execution on the same input
    Oracle(ExecutionOutcome),
    /// Never produced (the trial failed before reaching the reference)
    Unavailable,
}

impl TrialReference {
    pub fn text(&self) -> String {
        match self {
            TrialReference::Expected(expected) => expected.clone(),
            TrialReference::Oracle(outcome) => outcome.log_text(),
            TrialReference::Unavailable => String::new(),
        }
    }
}

/// Result of one trial, created once and never modified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialResult {
    /// 1-based trial index
    pub index: usize,
    pub input: String,
    pub candidate: Option<ExecutionOutcome>,
    pub reference: TrialReference,
    pub verdict: Verdict,
}

impl TrialResult {
    pub fn infrastructure(index: usize, input: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            index,
            input: input.into(),
            candidate: None,
            reference: TrialReference::Unavailable,
            verdict: Verdict::InfrastructureError {
                message: message.into(),
            },
        }
    }

    pub fn actual_text(&self) -> String {
        self.candidate
            .as_ref()
            .map(ExecutionOutcome::log_text)
            .unwrap_or_default()
    }

    pub fn expected_text(&self) -> String {
        self.reference.text()
    }

    /// The session-ending event for this trial, or `None` if it passed
    pub fn terminal_event(&self) -> Option<SessionEvent> {
        match &self.verdict {
            Verdict::Pass => None,
            Verdict::Fail { diagnostic } => Some(SessionEvent::Fail {
                index: self.index,
                input: self.input.clone(),
                expected: self.expected_text(),
                actual: self.actual_text(),
                diagnostic: diagnostic.clone(),
            }),
            Verdict::InfrastructureError { message } => Some(SessionEvent::Error {
                message: format!("trial {}: {}", self.index, message),
            }),
        }
    }
}

/// The per-index work a worker executes
///
/// Implemented by the sample and stress harnesses; the worker pool only knows
/// about indices, results and events.
#[async_trait]
pub trait TrialBody: Send + Sync {
    /// Run trial `index` (1-based) to completion
    async fn run_trial(&self, index: usize) -> TrialResult;

    /// Non-terminal event to publish when a trial completes, if any
    fn completion_event(&self, result: &TrialResult) -> Option<SessionEvent>;
}

/// Programs read line-oriented input; make sure the last line is terminated
pub fn stdin_text(input: &str) -> String {
    if input.is_empty() || input.ends_with('\n') {
        input.to_string()
    } else {
        format!("{}\n", input)
    }
}
