use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::trial::{TrialBody, TrialResult};
use crate::telemetry::SessionEvent;

/// State shared by every worker of one session
///
/// The next-index counter and the one-shot failure flag are the only mutable
/// state workers share.
#[derive(Debug)]
pub struct SharedState {
    next_index: AtomicUsize,
    failed: AtomicBool,
    total: usize,
}

impl SharedState {
    pub fn new(total: usize) -> Self {
        Self {
            next_index: AtomicUsize::new(0),
            failed: AtomicBool::new(false),
            total,
        }
    }

    /// Claim the next unclaimed 1-based index, or `None` when the budget is
    /// spent or the session already failed
    pub fn claim(&self) -> Option<usize> {
        if self.is_tripped() {
            return None;
        }
        let index = self.next_index.fetch_add(1, Ordering::AcqRel) + 1;
        (index <= self.total).then_some(index)
    }

    /// Set the failure flag; returns true only for the first caller
    pub fn trip(&self) -> bool {
        self.failed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_tripped(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

/// Worker that claims trial indices until none are left or the session fails
pub struct Worker {
    pub worker_id: String,
    pub state: Arc<SharedState>,
    pub body: Arc<dyn TrialBody>,
    pub events_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl Worker {
    /// Create a new worker with a random UUID
    pub fn new(
        state: Arc<SharedState>,
        body: Arc<dyn TrialBody>,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            worker_id: Uuid::new_v4().to_string(),
            state,
            body,
            events_tx,
        }
    }

    /// Run the worker loop and return every trial this worker executed
    ///
    /// Results of trials that finish after the flag is set are still returned
    /// (for the session logs) but their events are not published.
    pub async fn run(self) -> Vec<TrialResult> {
        let mut executed = Vec::new();

        // A claimed index always runs, even if the flag is set meanwhile
        while let Some(index) = self.state.claim() {
            let _ = self.events_tx.send(SessionEvent::Progress {
                index,
                total: self.state.total,
            });

            let result = match AssertUnwindSafe(self.body.run_trial(index))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!("Worker {} panicked in trial {}: {}", self.worker_id, index, message);
                    TrialResult::infrastructure(index, "", format!("trial panicked: {}", message))
                }
            };
            let is_terminal = !result.verdict.is_pass();
            let set_flag = is_terminal && self.state.trip();

            if (set_flag || !self.state.is_tripped())
                && let Some(event) = self.body.completion_event(&result)
            {
                let _ = self.events_tx.send(event);
            }

            executed.push(result);
            if is_terminal {
                debug!("Worker {} stopping after trial {}", self.worker_id, index);
                break;
            }
        }

        executed
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
