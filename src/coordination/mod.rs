//! Session coordination: trial harnesses, the worker pool and session logs

pub mod coordinator;
pub mod pool;
pub mod samples;
pub mod stress;
pub mod trial;
pub mod trial_log;
pub mod worker;

pub use coordinator::{
    Coordinator, Mode, ProgramSources, SessionConfig, SessionConfigBuilder, SessionReport,
    SessionVerdict,
};
pub use trial_log::{LocalTrialLogStorage, SessionSummary, TrialLogStorage};
