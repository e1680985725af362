//! Configuration constants for the stress tester
//!
//! This module centralizes all tunable parameters and constants used throughout
//! the application.

use std::time::Duration;

// ============================================================================
// Session Configuration
// ============================================================================

/// Default number of generated trials in a stress session
pub const DEFAULT_MAX_TRIALS: usize = 50;

/// Default per-execution time limit for the candidate and the oracle
///
/// The generator is never subject to it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

// ============================================================================
// Worker Configuration
// ============================================================================

/// Lower bound on concurrent workers, even on machines reporting less parallelism
pub const MIN_WORKERS: usize = 4;

/// Upper bound on concurrent workers; each may hold two live subprocesses
pub const MAX_WORKERS: usize = 16;

// ============================================================================
// Toolchain Configuration
// ============================================================================

pub const DEFAULT_COMPILER: &str = "g++";

pub const LANGUAGE_STANDARD: &str = "-std=c++17";

/// Optimization tier for the candidate
pub const CANDIDATE_OPT_LEVEL: &str = "-O2";

/// Optimization tier for the oracle and the generator
pub const SUPPORT_OPT_LEVEL: &str = "-O1";

// ============================================================================
// Workspace Layout
// ============================================================================

pub const CANDIDATE_SOURCE: &str = "solution.cpp";

pub const ORACLE_SOURCE: &str = "brute.cpp";

pub const GENERATOR_SOURCE: &str = "gen.cpp";

/// Directory (relative to the workspace) that receives session logs
pub const LOG_DIR_NAME: &str = "logs";

pub const INPUTS_LOG: &str = "inputs.txt";

pub const REFERENCE_LOG: &str = "reference.txt";

pub const CANDIDATE_LOG: &str = "candidate.txt";

pub const SESSION_SUMMARY: &str = "session.json";
