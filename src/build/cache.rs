use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use super::artifact::{ArtifactStamp, SourceArtifact};
use super::toolchain::Toolchain;
use crate::exec::process::{SPAWN_ATTEMPTS, is_executable_busy};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("source file not found: {}", path.display())]
    SourceMissing { path: PathBuf },

    #[error("compile failed: {reason}")]
    CompileFailed { reason: String, log: String },

    #[error("failed to launch compiler {}: {source}", compiler.display())]
    ToolchainUnavailable {
        compiler: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Compiles sources on demand and reuses binaries that are still fresh
#[derive(Debug, Clone, Default)]
pub struct BuildCache {
    toolchain: Toolchain,
}

impl BuildCache {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }

    /// Return the path of an up-to-date binary for `artifact`, compiling if needed
    pub async fn ensure_built(&self, artifact: &SourceArtifact) -> Result<PathBuf, BuildError> {
        let stamp = probe(artifact).await?;

        if !stamp.is_stale() {
            debug!("{} binary is up to date: {}", artifact.role, artifact.binary.display());
            return Ok(artifact.binary.clone());
        }

        info!("Compiling {} from {}", artifact.role, artifact.source.display());
        self.compile(artifact).await?;
        Ok(artifact.binary.clone())
    }

    async fn compile(&self, artifact: &SourceArtifact) -> Result<(), BuildError> {
        let mut attempt = 1;
        let output = loop {
            let result = Command::new(&self.toolchain.compiler)
                .args(self.toolchain.args_for(artifact))
                .kill_on_drop(true)
                .output()
                .await;
            match result {
                Err(e) if is_executable_busy(&e) && attempt < SPAWN_ATTEMPTS => {
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                    attempt += 1;
                }
                result => {
                    break result.map_err(|source| BuildError::ToolchainUnavailable {
                        compiler: self.toolchain.compiler.clone(),
                        source,
                    })?;
                }
            }
        };

        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            let file_name = artifact
                .source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let reason = first_error_line(&log, &file_name)
                .unwrap_or_else(|| format!("compiler exited with {}", output.status));
            return Err(BuildError::CompileFailed { reason, log });
        }

        if tokio::fs::metadata(&artifact.binary).await.is_err() {
            return Err(BuildError::CompileFailed {
                reason: format!("compiler produced no binary at {}", artifact.binary.display()),
                log,
            });
        }

        Ok(())
    }
}

/// Read the current modification times of the source and binary
async fn probe(artifact: &SourceArtifact) -> Result<ArtifactStamp, BuildError> {
    let source_mtime = modified(&artifact.source)
        .await
        .ok_or_else(|| BuildError::SourceMissing {
            path: artifact.source.clone(),
        })?;
    let binary_mtime = modified(&artifact.binary).await;

    Ok(ArtifactStamp {
        source_mtime,
        binary_mtime,
    })
}

async fn modified(path: &Path) -> Option<std::time::SystemTime> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    metadata.modified().ok()
}

fn diagnostic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r":\d+:\d+:\s*(?:fatal\s+)?error:").expect("diagnostic pattern is valid")
    })
}

/// Pick the line that best explains a failed compile
///
/// Prefers the first `file:line:col: error:` line naming `file_name`, then the
/// first non-empty line.
pub fn first_error_line(log: &str, file_name: &str) -> Option<String> {
    let pattern = diagnostic_pattern();

    log.lines()
        .map(str::trim)
        .find(|line| (file_name.is_empty() || line.contains(file_name)) && pattern.is_match(line))
        .or_else(|| log.lines().map(str::trim).find(|line| !line.is_empty()))
        .map(str::to_string)
}
