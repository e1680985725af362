use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::trial::{TrialBody, TrialResult};
use super::worker::{SharedState, Worker};
use crate::config::{MAX_WORKERS, MIN_WORKERS};
use crate::telemetry::SessionEvent;

/// Worker count derived from available parallelism, clamped to
/// [`MIN_WORKERS`, `MAX_WORKERS`]
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_WORKERS)
        .clamp(MIN_WORKERS, MAX_WORKERS)
}

/// Fans trial indices `1..=total` out across concurrent workers
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    worker_count: usize,
}

/// Everything the pool learned once all workers stopped
#[derive(Debug, Default)]
pub struct PoolReport {
    /// Executed trials sorted by index, including drained ones
    pub results: Vec<TrialResult>,
    /// Workers whose task died outside a trial; panics inside a trial become
    /// infrastructure results instead
    pub panicked_workers: usize,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
        }
    }

    /// Run `total` trials and wait for every worker to stop
    ///
    /// Progress and completion events go to `events_tx` as they happen. The
    /// terminal event is not sent here; see [`PoolReport::terminal_event`].
    pub async fn run(
        &self,
        total: usize,
        body: Arc<dyn TrialBody>,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> PoolReport {
        let state = Arc::new(SharedState::new(total));
        let worker_count = self.worker_count.min(total);

        info!("Spawning {} workers for {} trials...", worker_count, total);
        let handles: Vec<_> = (0..worker_count)
            .map(|_| {
                let worker = Worker::new(Arc::clone(&state), Arc::clone(&body), events_tx.clone());
                tokio::spawn(worker.run())
            })
            .collect();

        // Drop our sender so the channel closes once the caller's copy goes too
        drop(events_tx);

        let worker_results = futures::future::join_all(handles).await;

        let mut report = PoolReport::default();
        for (i, result) in worker_results.into_iter().enumerate() {
            match result {
                Ok(mut executed) => report.results.append(&mut executed),
                Err(e) => {
                    warn!("Worker {} panicked: {:#}", i, e);
                    report.panicked_workers += 1;
                }
            }
        }
        report.results.sort_by_key(|r| r.index);
        report
    }
}

impl PoolReport {
    pub fn trials_attempted(&self) -> usize {
        self.results.len()
    }

    pub fn trials_passed(&self) -> usize {
        self.results.iter().filter(|r| r.verdict.is_pass()).count()
    }

    /// The lowest-indexed trial that did not pass
    pub fn first_failure(&self) -> Option<&TrialResult> {
        self.results.iter().find(|r| !r.verdict.is_pass())
    }

    /// The single terminal event for the session
    ///
    /// The lowest-indexed non-passing trial wins, so the report follows index
    /// order rather than completion order.
    pub fn terminal_event(&self) -> SessionEvent {
        if let Some(event) = self.results.iter().find_map(TrialResult::terminal_event) {
            return event;
        }
        if self.panicked_workers > 0 {
            return SessionEvent::Error {
                message: format!("{} worker(s) panicked", self.panicked_workers),
            };
        }
        SessionEvent::Done
    }
}
