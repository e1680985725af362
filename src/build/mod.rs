//! Build cache: compile generator, oracle and candidate sources when stale

pub mod artifact;
pub mod cache;
pub mod toolchain;

pub use artifact::{ArtifactRole, SourceArtifact};
pub use cache::{BuildCache, BuildError};
pub use toolchain::Toolchain;
