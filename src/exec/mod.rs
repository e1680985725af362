//! Process execution: run one binary with bounded time and classify the outcome

pub mod outcome;
pub mod process;

pub use outcome::{CrashCause, ExecutionOutcome};
pub use process::ProcessRunner;
