//! High-level runner API for the stress tester.
//!
//! This module wires the build cache, log storage and coordinator together so
//! callers only supply program sources, a configuration and an event sink.
//!
//! This is the primary API for external users and for the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::build::BuildCache;
use crate::config::LOG_DIR_NAME;
use crate::coordination::{Coordinator, LocalTrialLogStorage};

pub use crate::build::Toolchain;
pub use crate::config::{DEFAULT_COMPILER, DEFAULT_MAX_TRIALS, DEFAULT_TIMEOUT};
pub use crate::coordination::{
    Mode, ProgramSources, SessionConfig, SessionConfigBuilder, SessionReport, SessionSummary,
    SessionVerdict,
};
pub use crate::problem::{Sample, load_samples, parse_samples};
pub use crate::telemetry::{ProgressStats, SessionEvent, spawn_progress_display};

/// Arguments for running a session
#[derive(Debug, Clone)]
pub struct SessionArgs {
    pub sources: ProgramSources,
    pub config: SessionConfig,
}

impl SessionArgs {
    /// Default source names in `dir` with the default configuration
    pub fn for_workspace(dir: impl AsRef<Path>) -> Self {
        Self {
            sources: ProgramSources::in_dir(dir),
            config: SessionConfig::default(),
        }
    }

    /// The configured log directory, or `logs/` next to the candidate source
    pub fn log_dir(&self) -> PathBuf {
        if let Some(dir) = &self.config.log_dir {
            return dir.clone();
        }
        self.sources
            .candidate
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(LOG_DIR_NAME)
    }

    fn coordinator(&self) -> Coordinator {
        Coordinator::new(
            BuildCache::new(self.config.toolchain.clone()),
            Arc::new(LocalTrialLogStorage::new(self.log_dir())),
        )
    }
}

/// Validate the candidate against fixed samples
///
/// Events stream to `events_tx` as trials run; exactly one of `Done`, `Fail`
/// or `Error` ends the stream.
///
/// # Example
///
/// ```no_run
/// use stress_tester::runner::{SessionArgs, load_samples, run_samples};
///
/// # async fn example() -> anyhow::Result<()> {
/// let args = SessionArgs::for_workspace("./problem");
/// let samples = load_samples("./problem/samples.json").await?;
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
///
/// let report = run_samples(args, samples, tx).await;
/// while let Some(event) = rx.recv().await {
///     println!("{:?}", event);
/// }
/// println!("{:?}", report.verdict);
/// # Ok(())
/// # }
/// ```
pub async fn run_samples(
    args: SessionArgs,
    samples: Vec<Sample>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
) -> SessionReport {
    args.coordinator()
        .run_samples(&args.config, &args.sources, samples, events_tx)
        .await
}

/// Compare the candidate with the oracle on up to `max_trials` generated inputs
pub async fn run_stress(
    args: SessionArgs,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
) -> SessionReport {
    args.coordinator()
        .run_stress(&args.config, &args.sources, events_tx)
        .await
}
