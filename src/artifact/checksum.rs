//! SHA-256 checksums for built artifacts.

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Suffix appended to the artifact file name for the sidecar.
pub const CHECKSUM_SUFFIX: &str = ".sha256";

/// Hex digest and size of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub sha256: String,
    pub size_bytes: u64,
}

pub fn sha256_file(path: &Path) -> io::Result<FileDigest> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok(FileDigest {
        sha256: format!("{:x}", hasher.finalize()),
        size_bytes: size,
    })
}

/// Write `<artifact>.sha256` next to the artifact.
///
/// Standard format, `<hash>  <filename>` (two spaces), with just the file name
/// so the check can be run from inside the output directory:
///   cd dist && sha256sum -c pyiec61850-*.whl.sha256
pub fn write_checksum_sidecar(artifact: &Path, digest: &FileDigest) -> io::Result<PathBuf> {
    let filename = artifact
        .file_name()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("artifact path has no file name: {}", artifact.display()),
            )
        })?
        .to_string_lossy()
        .into_owned();

    let sidecar = artifact.with_file_name(format!("{filename}{CHECKSUM_SUFFIX}"));
    fs::write(&sidecar, format!("{}  {}\n", digest.sha256, filename))?;
    Ok(sidecar)
}
