use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::artifact::{ArtifactRole, SourceArtifact};
use crate::config::{CANDIDATE_OPT_LEVEL, DEFAULT_COMPILER, LANGUAGE_STANDARD, SUPPORT_OPT_LEVEL};

/// External compiler invocation settings
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub compiler: PathBuf,
    pub standard: String,
    pub extra_flags: Vec<String>,
}

impl Toolchain {
    pub fn new(compiler: impl AsRef<Path>) -> Self {
        Self {
            compiler: compiler.as_ref().to_path_buf(),
            standard: LANGUAGE_STANDARD.to_string(),
            extra_flags: Vec::new(),
        }
    }

    pub fn with_flags(mut self, flags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// The candidate runs on every trial, so it gets the higher tier
    pub fn opt_level(role: ArtifactRole) -> &'static str {
        match role {
            ArtifactRole::Candidate => CANDIDATE_OPT_LEVEL,
            ArtifactRole::Oracle | ArtifactRole::Generator => SUPPORT_OPT_LEVEL,
        }
    }

    /// Compiler arguments: `<std> <opt> <extra...> <source> -o <binary>`
    pub fn args_for(&self, artifact: &SourceArtifact) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            self.standard.clone().into(),
            Self::opt_level(artifact.role).into(),
        ];
        args.extend(self.extra_flags.iter().map(OsString::from));
        args.push(artifact.source.clone().into_os_string());
        args.push("-o".into());
        args.push(artifact.binary.clone().into_os_string());
        args
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        Self::new(DEFAULT_COMPILER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_layout() {
        let toolchain = Toolchain::default().with_flags(["-DLOCAL"]);
        let mut artifact = SourceArtifact::new(ArtifactRole::Oracle, "/w/brute.cpp");
        artifact.binary = PathBuf::from("/w/brute");

        let args = toolchain.args_for(&artifact);

        assert_eq!(
            args,
            vec![
                OsString::from("-std=c++17"),
                OsString::from("-O1"),
                OsString::from("-DLOCAL"),
                OsString::from("/w/brute.cpp"),
                OsString::from("-o"),
                OsString::from("/w/brute"),
            ]
        );
    }

    #[test]
    fn test_candidate_gets_higher_tier() {
        assert_eq!(Toolchain::opt_level(ArtifactRole::Candidate), "-O2");
        assert_eq!(Toolchain::opt_level(ArtifactRole::Generator), "-O1");
    }
}
