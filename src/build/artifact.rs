use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Which of the three programs an artifact is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactRole {
    Generator,
    Oracle,
    Candidate,
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactRole::Generator => "generator",
            ArtifactRole::Oracle => "oracle",
            ArtifactRole::Candidate => "candidate",
        };
        f.write_str(name)
    }
}

/// A source file and the binary compiled from it
///
/// The binary path is derived from the source path alone (extension stripped),
/// so it does not depend on freshness or on the session.
#[derive(Debug, Clone)]
pub struct SourceArtifact {
    pub role: ArtifactRole,
    pub source: PathBuf,
    pub binary: PathBuf,
}

impl SourceArtifact {
    pub fn new(role: ArtifactRole, source: impl AsRef<Path>) -> Self {
        let source = source.as_ref().to_path_buf();
        let binary = source.with_extension(std::env::consts::EXE_EXTENSION);
        Self {
            role,
            source,
            binary,
        }
    }
}

/// Modification times observed for one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactStamp {
    pub source_mtime: SystemTime,
    /// `None` when no binary exists yet
    pub binary_mtime: Option<SystemTime>,
}

impl ArtifactStamp {
    pub fn is_stale(&self) -> bool {
        needs_rebuild(self.source_mtime, self.binary_mtime)
    }
}

/// A binary is valid only if it exists and is at least as new as its source
pub fn needs_rebuild(source_mtime: SystemTime, binary_mtime: Option<SystemTime>) -> bool {
    match binary_mtime {
        Some(binary_mtime) => binary_mtime < source_mtime,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_needs_rebuild() {
        let source = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);

        assert!(needs_rebuild(source, None));
        assert!(needs_rebuild(source, Some(source - Duration::from_secs(1))));
        assert!(!needs_rebuild(source, Some(source)));
        assert!(!needs_rebuild(source, Some(source + Duration::from_millis(1))));
    }

    #[test]
    fn test_binary_path_is_derived_from_source() {
        let artifact = SourceArtifact::new(ArtifactRole::Candidate, "/work/solution.cpp");
        let expected = Path::new("/work/solution").with_extension(std::env::consts::EXE_EXTENSION);

        assert_eq!(artifact.binary, expected);
        assert_eq!(artifact.role.to_string(), "candidate");
    }

    #[test]
    fn test_stamp_staleness() {
        let now = SystemTime::now();
        let stamp = ArtifactStamp {
            source_mtime: now,
            binary_mtime: Some(now - Duration::from_secs(60)),
        };
        assert!(stamp.is_stale());
    }
}
