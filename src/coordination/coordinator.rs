use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::pool::{PoolReport, WorkerPool, default_worker_count};
use super::samples::SampleTrial;
use super::stress::StressTrial;
use super::trial::TrialBody;
use super::trial_log::{SessionSummary, TrialLogStorage};
use crate::build::{ArtifactRole, BuildCache, BuildError, SourceArtifact, Toolchain};
use crate::config::{
    CANDIDATE_SOURCE, DEFAULT_MAX_TRIALS, DEFAULT_TIMEOUT, GENERATOR_SOURCE, ORACLE_SOURCE,
};
use crate::problem::Sample;
use crate::telemetry::SessionEvent;

/// Configuration for one session
#[derive(Debug, Clone, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct SessionConfig {
    /// Trial budget for stress mode
    #[builder(default = "DEFAULT_MAX_TRIALS")]
    pub max_trials: usize,
    /// Per-execution limit for candidate and oracle
    #[builder(default = "DEFAULT_TIMEOUT")]
    pub timeout: Duration,
    /// Overrides the parallelism-derived worker count
    #[builder(default, setter(strip_option))]
    pub worker_count: Option<usize>,
    #[builder(default)]
    pub toolchain: Toolchain,
    /// Defaults to `logs/` next to the candidate source
    #[builder(default, setter(into, strip_option))]
    pub log_dir: Option<PathBuf>,
}

impl SessionConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.max_trials == Some(0) {
            return Err("max_trials must be positive".to_string());
        }
        if self.worker_count == Some(Some(0)) {
            return Err("worker_count must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_trials: DEFAULT_MAX_TRIALS,
            timeout: DEFAULT_TIMEOUT,
            worker_count: None,
            toolchain: Toolchain::default(),
            log_dir: None,
        }
    }
}

/// Source files of the three programs
#[derive(Debug, Clone)]
pub struct ProgramSources {
    pub candidate: PathBuf,
    pub oracle: PathBuf,
    pub generator: PathBuf,
}

impl ProgramSources {
    /// The default file names inside a working directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            candidate: dir.join(CANDIDATE_SOURCE),
            oracle: dir.join(ORACLE_SOURCE),
            generator: dir.join(GENERATOR_SOURCE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Samples,
    Stress,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Samples => f.write_str("samples"),
            Mode::Stress => f.write_str("stress"),
        }
    }
}

/// How a session ended, mirroring its terminal event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionVerdict {
    Done,
    Failed { index: usize },
    Error { message: String },
}

impl SessionVerdict {
    fn from_terminal(event: &SessionEvent) -> Self {
        match event {
            SessionEvent::Fail { index, .. } => SessionVerdict::Failed { index: *index },
            SessionEvent::Error { message } => SessionVerdict::Error {
                message: message.clone(),
            },
            _ => SessionVerdict::Done,
        }
    }
}

/// Result of a finished session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: String,
    pub mode: Mode,
    pub trials_attempted: usize,
    pub trials_passed: usize,
    pub verdict: SessionVerdict,
    pub duration: Duration,
    /// Set when the trial logs were written
    pub log_dir: Option<PathBuf>,
}

/// Identity and timing of a running session
struct Session {
    id: String,
    mode: Mode,
    started_at: DateTime<Utc>,
    start_time: Instant,
}

impl Session {
    fn start(mode: Mode) -> Self {
        let session = Self {
            id: Uuid::new_v4().to_string(),
            mode,
            started_at: Utc::now(),
            start_time: Instant::now(),
        };
        info!("Starting {} session: {}", session.mode, session.id);
        session
    }
}

/// Built binaries, or the build error per program
struct Binaries {
    candidate: Result<PathBuf, BuildError>,
    oracle: Result<PathBuf, BuildError>,
    generator: Result<PathBuf, BuildError>,
}

impl Binaries {
    /// All three paths, or the first failing role in candidate, oracle, generator order
    fn require_all(self) -> Result<(PathBuf, PathBuf, PathBuf), (ArtifactRole, BuildError)> {
        let candidate = self.candidate.map_err(|e| (ArtifactRole::Candidate, e))?;
        let oracle = self.oracle.map_err(|e| (ArtifactRole::Oracle, e))?;
        let generator = self.generator.map_err(|e| (ArtifactRole::Generator, e))?;
        Ok((candidate, oracle, generator))
    }
}

/// The Coordinator orchestrates one session from build to terminal event
pub struct Coordinator {
    build_cache: BuildCache,
    log_storage: Arc<dyn TrialLogStorage>,
}

impl Coordinator {
    pub fn new(build_cache: BuildCache, log_storage: Arc<dyn TrialLogStorage>) -> Self {
        Self {
            build_cache,
            log_storage,
        }
    }

    /// Validate the candidate against fixed samples
    ///
    /// Oracle and generator are still built so their binaries are ready for a
    /// later stress session; failing to build them only produces a warning.
    pub async fn run_samples(
        &self,
        config: &SessionConfig,
        sources: &ProgramSources,
        samples: Vec<Sample>,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> SessionReport {
        let session = Session::start(Mode::Samples);

        if samples.is_empty() {
            return Self::abort(session, "no samples to run".to_string(), &events_tx);
        }

        let binaries = self.build_all(sources).await;
        let candidate = match binaries.candidate {
            Ok(path) => path,
            Err(e) => return Self::abort(session, format!("candidate {}", e), &events_tx),
        };
        for (role, result) in [
            (ArtifactRole::Oracle, &binaries.oracle),
            (ArtifactRole::Generator, &binaries.generator),
        ] {
            if let Err(e) = result {
                warn!("Ignoring {} build failure in sample mode: {}", role, e);
                let _ = events_tx.send(SessionEvent::Warning {
                    message: format!("{} {}", role, e),
                });
            }
        }

        let total = samples.len();
        let body = Arc::new(SampleTrial::new(candidate, samples, config.timeout));
        self.run_trials(session, config, total, body, events_tx).await
    }

    /// Validate the candidate against the oracle on generated inputs
    pub async fn run_stress(
        &self,
        config: &SessionConfig,
        sources: &ProgramSources,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> SessionReport {
        let session = Session::start(Mode::Stress);

        let (candidate, oracle, generator) = match self.build_all(sources).await.require_all() {
            Ok(paths) => paths,
            Err((role, e)) => return Self::abort(session, format!("{} {}", role, e), &events_tx),
        };

        let body = Arc::new(StressTrial::new(
            candidate,
            oracle,
            generator,
            config.timeout,
        ));
        self.run_trials(session, config, config.max_trials, body, events_tx)
            .await
    }

    /// Resolve all three binaries; completes before any trial runs
    ///
    /// Distinct binaries build concurrently. A role whose binary path is shared
    /// with an earlier role builds after it and finds the binary fresh.
    async fn build_all(&self, sources: &ProgramSources) -> Binaries {
        let candidate = SourceArtifact::new(ArtifactRole::Candidate, &sources.candidate);
        let oracle = SourceArtifact::new(ArtifactRole::Oracle, &sources.oracle);
        let generator = SourceArtifact::new(ArtifactRole::Generator, &sources.generator);

        let oracle_shared = oracle.binary == candidate.binary;
        let generator_shared =
            generator.binary == candidate.binary || generator.binary == oracle.binary;

        let (candidate_built, oracle_built, generator_built) = tokio::join!(
            self.build_cache.ensure_built(&candidate),
            self.build_unless_shared(&oracle, oracle_shared),
            self.build_unless_shared(&generator, generator_shared),
        );
        let oracle_built = match oracle_built {
            Some(built) => built,
            None => self.build_cache.ensure_built(&oracle).await,
        };
        let generator_built = match generator_built {
            Some(built) => built,
            None => self.build_cache.ensure_built(&generator).await,
        };

        Binaries {
            candidate: candidate_built,
            oracle: oracle_built,
            generator: generator_built,
        }
    }

    async fn build_unless_shared(
        &self,
        artifact: &SourceArtifact,
        shared: bool,
    ) -> Option<Result<PathBuf, BuildError>> {
        if shared {
            debug!(
                "{} shares {} with another program, building it afterwards",
                artifact.role,
                artifact.binary.display()
            );
            return None;
        }
        Some(self.build_cache.ensure_built(artifact).await)
    }

    /// Run the worker pool, persist logs, then send the single terminal event
    async fn run_trials(
        &self,
        session: Session,
        config: &SessionConfig,
        total: usize,
        body: Arc<dyn TrialBody>,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> SessionReport {
        let pool = WorkerPool::new(config.worker_count.unwrap_or_else(default_worker_count));
        let report = pool.run(total, body, events_tx.clone()).await;

        let terminal = report.terminal_event();
        let verdict = SessionVerdict::from_terminal(&terminal);
        let log_dir = self.persist_logs(&session, &report, &verdict).await;

        let duration = session.start_time.elapsed();
        info!(
            "Session {} finished: {} of {} trials passed in {:.2}s ({:?})",
            session.id,
            report.trials_passed(),
            report.trials_attempted(),
            duration.as_secs_f64(),
            verdict
        );
        let _ = events_tx.send(terminal);

        SessionReport {
            session_id: session.id,
            mode: session.mode,
            trials_attempted: report.trials_attempted(),
            trials_passed: report.trials_passed(),
            verdict,
            duration,
            log_dir,
        }
    }

    /// Write the cumulative logs and the summary; failures are logged only
    async fn persist_logs(
        &self,
        session: &Session,
        report: &PoolReport,
        verdict: &SessionVerdict,
    ) -> Option<PathBuf> {
        let summary = SessionSummary {
            session_id: session.id.clone(),
            mode: session.mode,
            started_at: session.started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            trials_attempted: report.trials_attempted(),
            trials_passed: report.trials_passed(),
            verdict: verdict.clone(),
            failing_index: report.first_failure().map(|r| r.index),
        };

        let written = async {
            self.log_storage.write_trials(&report.results).await?;
            self.log_storage.write_summary(&summary).await
        }
        .await;

        match written {
            Ok(()) => {
                info!(
                    "Trial logs written to {}",
                    self.log_storage.location().display()
                );
                Some(self.log_storage.location().to_path_buf())
            }
            Err(e) => {
                warn!("Failed to persist trial logs: {:#}", e);
                None
            }
        }
    }

    /// End a session before any trial ran
    fn abort(
        session: Session,
        message: String,
        events_tx: &mpsc::UnboundedSender<SessionEvent>,
    ) -> SessionReport {
        warn!("Session {} aborted: {}", session.id, message);
        let _ = events_tx.send(SessionEvent::Error {
            message: message.clone(),
        });

        SessionReport {
            session_id: session.id,
            mode: session.mode,
            trials_attempted: 0,
            trials_passed: 0,
            verdict: SessionVerdict::Error { message },
            duration: session.start_time.elapsed(),
            log_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = SessionConfigBuilder::default().build().unwrap();

        assert_eq!(config.max_trials, DEFAULT_MAX_TRIALS);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.worker_count, None);
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn test_builder_rejects_zero_budget() {
        assert!(SessionConfigBuilder::default().max_trials(0).build().is_err());
        assert!(
            SessionConfigBuilder::default()
                .worker_count(0)
                .build()
                .is_err()
        );
        assert!(
            SessionConfigBuilder::default()
                .max_trials(1)
                .worker_count(1)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_sources_in_dir() {
        let sources = ProgramSources::in_dir("/work");

        assert_eq!(sources.candidate, PathBuf::from("/work/solution.cpp"));
        assert_eq!(sources.oracle, PathBuf::from("/work/brute.cpp"));
        assert_eq!(sources.generator, PathBuf::from("/work/gen.cpp"));
    }

    #[test]
    fn test_verdict_from_terminal() {
        assert_eq!(
            SessionVerdict::from_terminal(&SessionEvent::Done),
            SessionVerdict::Done
        );
        assert_eq!(
            SessionVerdict::from_terminal(&SessionEvent::Fail {
                index: 7,
                input: String::new(),
                expected: String::new(),
                actual: String::new(),
                diagnostic: None,
            }),
            SessionVerdict::Failed { index: 7 }
        );
    }
}
