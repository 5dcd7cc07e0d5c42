//! Locating and recording the artifact copied out of the build container.
//!
//! - [`locate_artifact`] - scan the output directory for the packaged wheel
//! - [`checksum`] - sha256 of the artifact and its `sha256sum`-style sidecar
//! - [`manifest`] - JSON record of the run written next to the artifact

pub mod checksum;
pub mod manifest;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Output directory used when nothing else is configured.
pub const DEFAULT_OUTPUT_DIR: &str = "dist";

/// Packaging-format extension the build is expected to produce.
pub const DEFAULT_ARTIFACT_SUFFIX: &str = ".whl";

/// Result of scanning an output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactResult {
    /// First matching file, in directory iteration order.
    pub path: Option<PathBuf>,
    pub found: bool,
    /// How many entries matched; more than one means `path` is ambiguous.
    pub candidates: usize,
}

/// Create the output directory (and parents) if absent.
pub fn ensure_output_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// Regular files directly inside `dir` whose names end with `suffix`, in
/// directory iteration order.
pub fn matching_files(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(suffix) && entry.path().is_file() {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Find the first regular file directly inside `dir` whose name ends with `suffix`.
///
/// Subdirectories are not searched. When several files match, the first one
/// returned by the directory iterator wins; that order is platform-defined,
/// so callers should treat `candidates > 1` as a reason to warn.
pub fn locate_artifact(dir: &Path, suffix: &str) -> Result<ArtifactResult, walkdir::Error> {
    let files = matching_files(dir, suffix)?;
    Ok(ArtifactResult {
        candidates: files.len(),
        found: !files.is_empty(),
        path: files.into_iter().next(),
    })
}
