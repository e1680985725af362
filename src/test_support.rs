//! Fixtures shared by unit and integration tests
//!
//! Programs are `/bin/sh` scripts. The fake toolchains below take the same
//! argument layout the build cache passes to a real compiler
//! (`<flags...> <source> -o <binary>`), so "compiling" a script copies it into
//! place as an executable.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::build::Toolchain;

/// Write an executable shell script named `name` into `dir`
pub fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = write_source(dir.path(), name, body);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Write a non-executable program source (a shell script) for the fake compiler
pub fn write_source(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    path
}

/// A toolchain whose "compiler" copies the source to the output path
pub fn copying_toolchain(dir: &TempDir) -> Toolchain {
    let compiler = write_script(
        dir,
        "fake-cc",
        r#"while [ "$#" -gt 3 ]; do shift; done
cp "$1" "$3" && chmod +x "$3""#,
    );
    Toolchain::new(compiler)
}

/// Like [`copying_toolchain`], but appends each compiled source path to `record`
pub fn recording_toolchain(dir: &TempDir, record: &Path) -> Toolchain {
    let compiler = write_script(
        dir,
        "recording-cc",
        &format!(
            r#"while [ "$#" -gt 3 ]; do shift; done
echo "$1" >> '{}'
cp "$1" "$3" && chmod +x "$3""#,
            record.display()
        ),
    );
    Toolchain::new(compiler)
}

/// A toolchain that rejects every source with a compiler-style diagnostic
pub fn failing_toolchain(dir: &TempDir) -> Toolchain {
    let compiler = write_script(
        dir,
        "broken-cc",
        r#"while [ "$#" -gt 3 ]; do shift; done
echo "In function 'int main()':" >&2
echo "$1:3:5: error: expected ';' before '}' token" >&2
echo "compilation terminated." >&2
exit 1"#,
    );
    Toolchain::new(compiler)
}
