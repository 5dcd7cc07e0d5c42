//! `build-manifest.json`: what was built, from what, and when.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const MANIFEST_FILENAME: &str = "build-manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub library_version: String,
    pub image: String,
    pub engine: String,
    pub artifact: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub started_at_utc: String,
    pub finished_at_utc: String,
    /// Files matching the suffix after extraction; `artifact` is the first.
    #[serde(default = "one")]
    pub candidates: usize,
    /// `artifact` was already in the output directory before this run copied
    /// anything, while other matches exist: it may be from an earlier build.
    #[serde(default)]
    pub artifact_predates_run: bool,
}

fn one() -> usize {
    1
}

/// Current time as an RFC 3339 UTC timestamp.
pub fn now_utc_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MANIFEST_FILENAME)
}

/// Write the manifest into `output_dir`, replacing any previous one.
///
/// Written to a temporary name first and renamed into place, so readers never
/// see a half-written file.
pub fn write_manifest(output_dir: &Path, manifest: &BuildManifest) -> io::Result<PathBuf> {
    let path = manifest_path(output_dir);
    let tmp = output_dir.join(format!(".{MANIFEST_FILENAME}.tmp"));
    let bytes = serde_json::to_vec_pretty(manifest).map_err(io::Error::from)?;
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, &path)?;
    Ok(path)
}

pub fn load_manifest(output_dir: &Path) -> io::Result<BuildManifest> {
    let bytes = fs::read(manifest_path(output_dir))?;
    serde_json::from_slice(&bytes).map_err(io::Error::from)
}
