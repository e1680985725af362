use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Events streamed from a session to its consumer
///
/// Exactly one terminal event (`Done`, `Fail` or `Error`) is sent per session.
/// Everything else may arrive out of index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A worker started trial `index` of `total`
    Progress { index: usize, total: usize },
    /// A sample finished (sample mode only)
    Sample {
        index: usize,
        input: String,
        expected: String,
        actual: String,
        passed: bool,
    },
    /// A generated trial passed (stress mode only)
    Pass { index: usize },
    /// Non-fatal condition, e.g. the oracle failed to build in sample mode
    Warning { message: String },
    /// Terminal: the candidate disagreed with the expected or oracle output
    Fail {
        index: usize,
        input: String,
        expected: String,
        actual: String,
        diagnostic: Option<String>,
    },
    /// Terminal: every trial passed
    Done,
    /// Terminal: the session could not run to completion
    Error { message: String },
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::Fail { .. } | SessionEvent::Done | SessionEvent::Error { .. }
        )
    }
}

/// Statistics aggregated from session events
#[derive(Debug, Default, Clone)]
pub struct ProgressStats {
    pub total: usize,
    pub trials_started: usize,
    pub trials_passed: usize,
    pub warnings: usize,
}

impl ProgressStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a session event
    pub fn update(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Progress { total, .. } => {
                self.total = *total;
                self.trials_started += 1;
            }
            SessionEvent::Sample { passed, .. } => {
                if *passed {
                    self.trials_passed += 1;
                }
            }
            SessionEvent::Pass { .. } => {
                self.trials_passed += 1;
            }
            SessionEvent::Warning { .. } => {
                self.warnings += 1;
            }
            // Terminal events carry no counters
            SessionEvent::Fail { .. } | SessionEvent::Done | SessionEvent::Error { .. } => {}
        }
    }
}

/// Consume session events, drawing progress bars unless `quiet`
///
/// The task ends when the channel closes and yields the terminal event, if one
/// arrived.
pub fn spawn_progress_display(
    mut events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    quiet: bool,
) -> JoinHandle<Option<SessionEvent>> {
    let multi_progress = if quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };
    let trials_bar = multi_progress.add(ProgressBar::new(0));
    trials_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] Trials: [{bar:30.cyan/blue}] {pos}/{len} ({percent}%)")
            .unwrap()
            .progress_chars("=>-"),
    );
    let status_bar = multi_progress.add(ProgressBar::new(0));
    status_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] Status: {msg}")
            .unwrap(),
    );

    tokio::spawn(async move {
        let mut stats = ProgressStats::new();
        let mut terminal = None;

        while let Some(event) = events_rx.recv().await {
            stats.update(&event);
            trials_bar.set_length(stats.total as u64);
            trials_bar.set_position(stats.trials_passed as u64);

            match &event {
                SessionEvent::Warning { message } => {
                    let _ = multi_progress.println(format!("warning: {}", message));
                }
                SessionEvent::Sample {
                    index,
                    passed: false,
                    ..
                } => {
                    status_bar.set_message(format!("sample {} failed", index));
                }
                SessionEvent::Progress { .. } => {
                    status_bar.set_message(format!(
                        "{} started, {} passed",
                        stats.trials_started, stats.trials_passed
                    ));
                }
                _ => {}
            }

            if event.is_terminal() {
                terminal = Some(event);
            }
        }

        trials_bar.finish();
        status_bar.finish_with_message(final_status(terminal.as_ref(), &stats));
        terminal
    })
}

/// Status line shown once the session has ended
fn final_status(terminal: Option<&SessionEvent>, stats: &ProgressStats) -> String {
    let status = match terminal {
        Some(SessionEvent::Done) => "all trials passed".to_string(),
        Some(SessionEvent::Fail { index, .. }) => format!("trial {} failed", index),
        Some(SessionEvent::Error { message }) => format!("error: {}", message),
        _ => "stopped".to_string(),
    };
    match stats.warnings {
        0 => status,
        1 => format!("{} (1 warning)", status),
        n => format!("{} ({} warnings)", status, n),
    }
}
