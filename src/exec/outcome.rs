use std::fmt;
use std::time::Duration;

/// Why a process ended abnormally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashCause {
    /// Terminated by the given signal number
    Signal(i32),
    /// Exited with the given non-zero status
    ExitCode(i32),
}

impl fmt::Display for CrashCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrashCause::Signal(signal) => write!(f, "killed by signal {}", signal),
            CrashCause::ExitCode(code) => write!(f, "exited with code {}", code),
        }
    }
}

/// Normalized result of one subprocess execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Exited normally with non-blank output (already trimmed)
    Completed { output: String, exit_code: i32 },
    /// Did not exit within the time limit and was killed
    TimedOut { limit: Duration },
    /// Terminated by a signal or a non-zero exit status
    Crashed { cause: CrashCause, stderr: String },
    /// Exited zero but printed nothing except whitespace
    NoOutputProduced,
}

impl ExecutionOutcome {
    /// Trimmed standard output, if the execution completed
    pub fn output(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Completed { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Human-readable description of the outcome, suitable for a fail event
    pub fn diagnostic(&self) -> String {
        match self {
            ExecutionOutcome::Completed { .. } => "completed".to_string(),
            ExecutionOutcome::TimedOut { limit } => {
                format!("time limit exceeded ({} ms)", limit.as_millis())
            }
            ExecutionOutcome::Crashed { cause, stderr } if stderr.is_empty() => cause.to_string(),
            ExecutionOutcome::Crashed { cause, stderr } => format!("{}: {}", cause, stderr),
            ExecutionOutcome::NoOutputProduced => "produced no output".to_string(),
        }
    }

    /// Text recorded in session logs: the output, or the diagnostic in angle brackets
    pub fn log_text(&self) -> String {
        match self.output() {
            Some(output) => output.to_string(),
            None => format!("<{}>", self.diagnostic()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_are_distinguishable() {
        let timed_out = ExecutionOutcome::TimedOut {
            limit: Duration::from_millis(2000),
        };
        let crashed = ExecutionOutcome::Crashed {
            cause: CrashCause::ExitCode(3),
            stderr: "assertion failed".to_string(),
        };
        let signaled = ExecutionOutcome::Crashed {
            cause: CrashCause::Signal(11),
            stderr: String::new(),
        };

        assert_eq!(timed_out.diagnostic(), "time limit exceeded (2000 ms)");
        assert_eq!(crashed.diagnostic(), "exited with code 3: assertion failed");
        assert_eq!(signaled.diagnostic(), "killed by signal 11");
        assert_eq!(
            ExecutionOutcome::NoOutputProduced.diagnostic(),
            "produced no output"
        );
    }

    #[test]
    fn test_log_text() {
        let completed = ExecutionOutcome::Completed {
            output: "42".to_string(),
            exit_code: 0,
        };
        assert_eq!(completed.log_text(), "42");
        assert_eq!(completed.output(), Some("42"));
        assert_eq!(
            ExecutionOutcome::NoOutputProduced.log_text(),
            "<produced no output>"
        );
    }
}
