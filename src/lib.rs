// Public API - only expose the runner module
pub mod runner;

// Internal modules - organized by subsystem
mod build;
mod compare;
mod config;
mod coordination;
mod exec;
mod problem;
mod telemetry;

#[cfg(all(test, unix))]
mod test_support;
