use anyhow::{Context, Result};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::outcome::{CrashCause, ExecutionOutcome};

/// Runs compiled binaries as child processes with an optional time limit
///
/// One attempt per call, no retries. Every exit path (normal exit, timeout or
/// error) releases the child and its pipes before returning: timed-out children
/// are killed and reaped, and the child handle is `kill_on_drop` for the rest.
/// Reading the pipes to EOF counts against the same deadline, so a descendant
/// that keeps stdout open turns the run into `TimedOut`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Execute `binary` with `stdin_text` on standard input
    ///
    /// `time_limit` of `None` waits forever (used for the generator). A zero
    /// limit always yields `TimedOut`. The `Err` arm is reserved for failing to
    /// launch or wait on the process at all.
    pub async fn run(
        &self,
        binary: &Path,
        stdin_text: &str,
        time_limit: Option<Duration>,
    ) -> Result<ExecutionOutcome> {
        let deadline = time_limit.map(|limit| Instant::now() + limit);
        let mut child = spawn_piped(binary)
            .await
            .with_context(|| format!("Failed to spawn {}", binary.display()))?;

        // Feed stdin from its own task so a child that never reads cannot stall us.
        // Dropping the pipe at the end of the task closes the child's input.
        let stdin_pipe = child.stdin.take();
        let input = stdin_text.as_bytes().to_vec();
        let mut feeder = tokio::spawn(async move {
            if let Some(mut pipe) = stdin_pipe {
                // A child that exits without reading closes the pipe; that is not our error
                let _ = pipe.write_all(&input).await;
                let _ = pipe.shutdown().await;
            }
        });
        let mut stdout_reader = spawn_drain(child.stdout.take());
        let mut stderr_reader = spawn_drain(child.stderr.take());

        let waited = match deadline {
            Some(_) if time_limit.is_some_and(|limit| limit.is_zero()) => None,
            Some(deadline) => tokio::time::timeout_at(deadline, child.wait()).await.ok(),
            None => Some(child.wait().await),
        };

        let status = match waited {
            Some(status) => status,
            None => {
                let limit = time_limit.unwrap_or_default();
                debug!("{} exceeded {} ms, killing", binary.display(), limit.as_millis());
                // kill() also reaps the child
                let _ = child.kill().await;
                feeder.abort();
                stdout_reader.abort();
                stderr_reader.abort();
                return Ok(ExecutionOutcome::TimedOut { limit });
            }
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                feeder.abort();
                stdout_reader.abort();
                stderr_reader.abort();
                return Err(e).with_context(|| format!("Failed to wait for {}", binary.display()));
            }
        };

        // A descendant that inherited the pipes can hold them open after the
        // child exits, so draining shares the same deadline
        let drained = async {
            let _ = (&mut feeder).await;
            let stdout = (&mut stdout_reader).await.unwrap_or_default();
            let stderr = (&mut stderr_reader).await.unwrap_or_default();
            (stdout, stderr)
        };
        let drained = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, drained).await.ok(),
            None => Some(drained.await),
        };

        match drained {
            Some((stdout, stderr)) => Ok(classify(status, &stdout, &stderr)),
            None => {
                let limit = time_limit.unwrap_or_default();
                debug!(
                    "{} left its output open past {} ms",
                    binary.display(),
                    limit.as_millis()
                );
                feeder.abort();
                stdout_reader.abort();
                stderr_reader.abort();
                Ok(ExecutionOutcome::TimedOut { limit })
            }
        }
    }
}

/// ETXTBSY: the binary is still open for writing in a concurrently forked child
const EXECUTABLE_BUSY: i32 = 26;
pub(crate) const SPAWN_ATTEMPTS: u32 = 5;

pub(crate) fn is_executable_busy(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(EXECUTABLE_BUSY)
}

/// Spawn with all three standard streams piped
///
/// A freshly written binary can briefly fail with `ETXTBSY`; only that error is
/// retried, and only a bounded number of times.
async fn spawn_piped(binary: &Path) -> std::io::Result<Child> {
    let mut attempt = 1;
    loop {
        let spawned = Command::new(binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        match spawned {
            Err(e) if is_executable_busy(&e) && attempt < SPAWN_ATTEMPTS => {
                debug!("{} is busy, retrying spawn", binary.display());
                tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Read a child pipe to the end on a separate task
fn spawn_drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer).await;
        }
        buffer
    })
}

/// Classify a finished process
///
/// Precedence: signal, non-zero exit, blank output, completed. Timeouts never
/// reach this function.
pub(crate) fn classify(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> ExecutionOutcome {
    if let Some(signal) = termination_signal(&status) {
        return ExecutionOutcome::Crashed {
            cause: CrashCause::Signal(signal),
            stderr: first_non_empty_line(stderr),
        };
    }

    match status.code() {
        Some(0) => {
            let output = String::from_utf8_lossy(stdout);
            let trimmed = output.trim();
            if trimmed.is_empty() {
                ExecutionOutcome::NoOutputProduced
            } else {
                ExecutionOutcome::Completed {
                    output: trimmed.to_string(),
                    exit_code: 0,
                }
            }
        }
        Some(code) => ExecutionOutcome::Crashed {
            cause: CrashCause::ExitCode(code),
            stderr: first_non_empty_line(stderr),
        },
        // No code and no signal: report as an unknown abnormal exit
        None => ExecutionOutcome::Crashed {
            cause: CrashCause::ExitCode(-1),
            stderr: first_non_empty_line(stderr),
        },
    }
}

#[cfg(unix)]
fn termination_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

fn first_non_empty_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::write_script;
    use std::os::unix::process::ExitStatusExt;
    use std::time::Instant;
    use tempfile::TempDir;

    #[test]
    fn test_classify_precedence() {
        // Raw wait statuses: exit code lives in the high byte, signal in the low bits
        let ok = ExitStatus::from_raw(0);
        let exit_one = ExitStatus::from_raw(1 << 8);
        let sigkill = ExitStatus::from_raw(9);

        assert_eq!(
            classify(ok, b"  7 8\n", b""),
            ExecutionOutcome::Completed {
                output: "7 8".to_string(),
                exit_code: 0
            }
        );
        assert_eq!(
            classify(ok, b" \n\t", b""),
            ExecutionOutcome::NoOutputProduced
        );
        assert_eq!(
            classify(exit_one, b"partial", b"\n\nbad input\nmore\n"),
            ExecutionOutcome::Crashed {
                cause: CrashCause::ExitCode(1),
                stderr: "bad input".to_string()
            }
        );
        // A signal wins even when output was produced
        assert_eq!(
            classify(sigkill, b"42", b""),
            ExecutionOutcome::Crashed {
                cause: CrashCause::Signal(9),
                stderr: String::new()
            }
        );
    }

    #[tokio::test]
    async fn test_echo_completes_with_trimmed_output() {
        let dir = TempDir::new().unwrap();
        let echo = write_script(&dir, "echo", "cat");

        let outcome = ProcessRunner::new()
            .run(&echo, "1 2 3\n", Some(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(outcome.output(), Some("1 2 3"));
    }

    #[tokio::test]
    async fn test_never_terminating_program_times_out() {
        let dir = TempDir::new().unwrap();
        let sleeper = write_script(&dir, "sleeper", "exec sleep 30");

        let start = Instant::now();
        let outcome = ProcessRunner::new()
            .run(&sleeper, "", Some(Duration::from_millis(200)))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ExecutionOutcome::TimedOut {
                limit: Duration::from_millis(200)
            }
        );
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_background_child_holding_stdout_times_out() {
        let dir = TempDir::new().unwrap();
        let forker = write_script(&dir, "forker", "sleep 30 &\necho 1");

        let start = Instant::now();
        let outcome = ProcessRunner::new()
            .run(&forker, "", Some(Duration::from_millis(200)))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ExecutionOutcome::TimedOut {
                limit: Duration::from_millis(200)
            }
        );
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_zero_limit_times_out() {
        let dir = TempDir::new().unwrap();
        let echo = write_script(&dir, "echo", "cat");

        let outcome = ProcessRunner::new()
            .run(&echo, "5\n", Some(Duration::ZERO))
            .await
            .unwrap();

        assert!(matches!(outcome, ExecutionOutcome::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let crasher = write_script(&dir, "crasher", "echo 'index out of range' >&2\nexit 3");

        let outcome = ProcessRunner::new()
            .run(&crasher, "", Some(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ExecutionOutcome::Crashed {
                cause: CrashCause::ExitCode(3),
                stderr: "index out of range".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_signal_is_reported() {
        let dir = TempDir::new().unwrap();
        let killer = write_script(&dir, "killer", "kill -9 $$");

        let outcome = ProcessRunner::new()
            .run(&killer, "", Some(Duration::from_secs(5)))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ExecutionOutcome::Crashed {
                cause: CrashCause::Signal(9),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_blank_output_is_no_output() {
        let dir = TempDir::new().unwrap();
        let silent = write_script(&dir, "silent", "printf '  \\n'");

        let outcome = ProcessRunner::new()
            .run(&silent, "ignored\n", Some(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(outcome, ExecutionOutcome::NoOutputProduced);
    }

    #[tokio::test]
    async fn test_generator_runs_without_limit() {
        let dir = TempDir::new().unwrap();
        let generator = write_script(&dir, "gen", "echo 42");

        let outcome = ProcessRunner::new().run(&generator, "", None).await.unwrap();

        assert_eq!(outcome.output(), Some("42"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");

        let result = ProcessRunner::new()
            .run(&missing, "", Some(Duration::from_secs(1)))
            .await;

        assert!(result.is_err());
    }
}
