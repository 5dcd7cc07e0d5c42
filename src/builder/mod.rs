//! Containerized artifact build orchestration.
//!
//! One run walks a fixed sequence of states:
//!
//! ```text
//! Idle → ToolChecked → ImageBuilt → ContainerCreated → ArtifactsExtracted
//!      → ArtifactFound | ArtifactMissing → Cleaned
//! ```
//!
//! Every transition is a hard gate. A failure before `ContainerCreated`
//! aborts with nothing to clean up; from `ContainerCreated` on, the
//! container is owned by a [`ContainerGuard`] and the run always passes
//! through `Cleaned`, whatever happened in between.

mod guard;

#[cfg(test)]
pub(crate) mod fake;

pub use guard::ContainerGuard;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::artifact::checksum::{sha256_file, write_checksum_sidecar, FileDigest};
use crate::artifact::manifest::{now_utc_rfc3339, write_manifest, BuildManifest};
use crate::artifact::{ensure_output_dir, locate_artifact, matching_files};
use crate::config::BuilderConfig;
use crate::engine::{ContainerEngine, ContainerId, ImageId};
use crate::error::BuildError;
use crate::preflight::check_tool_available;

/// What one invocation was asked to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub library_version: String,
    pub output_directory: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    ToolChecked,
    ImageBuilt,
    ContainerCreated,
    ArtifactsExtracted,
    ArtifactFound,
    ArtifactMissing,
    Cleaned,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::ToolChecked => "ToolChecked",
            Self::ImageBuilt => "ImageBuilt",
            Self::ContainerCreated => "ContainerCreated",
            Self::ArtifactsExtracted => "ArtifactsExtracted",
            Self::ArtifactFound => "ArtifactFound",
            Self::ArtifactMissing => "ArtifactMissing",
            Self::Cleaned => "Cleaned",
        };
        f.write_str(name)
    }
}

/// Shared "stop at the next gate" flag, set from the Ctrl-C handler.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Successful run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub request: BuildRequest,
    pub image: ImageId,
    pub container: ContainerId,
    pub artifact: PathBuf,
    /// Number of files that matched the suffix; the first one is `artifact`.
    pub candidates: usize,
    /// `artifact` was in the output directory before extraction and other
    /// matches exist, so it may be left over from an earlier build.
    pub artifact_predates_run: bool,
    pub digest: Option<FileDigest>,
    pub checksum_file: Option<PathBuf>,
    pub manifest_file: Option<PathBuf>,
    pub states: Vec<BuildState>,
}

/// What happened between container creation and cleanup.
struct Located {
    artifact: PathBuf,
    candidates: usize,
    predates_run: bool,
    digest: Option<FileDigest>,
    checksum_file: Option<PathBuf>,
    manifest_file: Option<PathBuf>,
}

/// Drives one containerized build against a [`ContainerEngine`].
pub struct ArtifactBuilder<E: ContainerEngine> {
    engine: E,
    config: BuilderConfig,
    cancel: CancelFlag,
}

impl<E: ContainerEngine> ArtifactBuilder<E> {
    pub fn new(engine: E, config: BuilderConfig) -> Self {
        Self {
            engine,
            config,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run(&self) -> Result<BuildReport, BuildError> {
        let mut history = Vec::new();
        self.run_recording(&mut history)
    }

    /// Like [`run`](Self::run), also leaving the states reached in `history`
    /// when the run fails.
    pub fn run_recording(
        &self,
        history: &mut Vec<BuildState>,
    ) -> Result<BuildReport, BuildError> {
        history.clear();
        history.push(BuildState::Idle);

        let request = self.config.request();
        let started_at = now_utc_rfc3339();
        tracing::info!(
            version = %request.library_version,
            output = %request.output_directory.display(),
            engine = self.engine.program(),
            "starting containerized build"
        );

        let engine_version = check_tool_available(&self.engine)?;
        tracing::info!(engine = %engine_version, "container engine available");
        self.advance(history, BuildState::ToolChecked)?;

        let spec = self.config.image_build_spec();
        tracing::info!(
            tag = %spec.tag,
            version = %request.library_version,
            "building image"
        );
        let image = self
            .engine
            .build_image(&spec)
            .map_err(|source| {
                self.interrupted_or(history, BuildError::ImageBuild(source))
            })?;
        self.advance(history, BuildState::ImageBuilt)?;

        let container = self
            .engine
            .create_container(&image)
            .map_err(|source| {
                self.interrupted_or(history, BuildError::ContainerCreate(source))
            })?;
        tracing::info!(container = container.short(), image = %image, "container created");

        let guard = ContainerGuard::new(&self.engine, container.clone());
        let outcome = self.with_container(guard.id(), &request, &image, &started_at, history);
        let cleanup = guard.release();
        history.push(BuildState::Cleaned);

        match (outcome, cleanup) {
            (Ok(located), Ok(())) => {
                tracing::info!(container = container.short(), "container removed");
                Ok(BuildReport {
                    request,
                    image,
                    container,
                    artifact: located.artifact,
                    candidates: located.candidates,
                    artifact_predates_run: located.predates_run,
                    digest: located.digest,
                    checksum_file: located.checksum_file,
                    manifest_file: located.manifest_file,
                    states: history.clone(),
                })
            }
            (Ok(_), Err(source)) => Err(BuildError::Cleanup { container, source }),
            (Err(primary), Ok(())) => {
                tracing::info!(container = container.short(), "container removed");
                Err(primary)
            }
            (Err(primary), Err(cleanup)) => Err(primary.with_cleanup(container, cleanup)),
        }
    }

    /// Steps that run while the container exists.
    fn with_container(
        &self,
        container: &ContainerId,
        request: &BuildRequest,
        image: &ImageId,
        started_at: &str,
        history: &mut Vec<BuildState>,
    ) -> Result<Located, BuildError> {
        self.advance(history, BuildState::ContainerCreated)?;

        let output_dir = &request.output_directory;
        ensure_output_dir(output_dir).map_err(|source| BuildError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let suffix = &self.config.artifact_suffix;
        let scan_err = |source| BuildError::Scan {
            path: output_dir.clone(),
            source,
        };
        let before = matching_files(output_dir, suffix).map_err(scan_err)?;

        tracing::info!(
            from = %self.config.container_dir,
            to = %output_dir.display(),
            "copying artifacts out of container"
        );
        self.engine
            .copy_out(container, &self.config.container_dir, output_dir)
            .map_err(|source| {
                let err = BuildError::Extraction {
                    container: container.clone(),
                    source,
                };
                self.interrupted_or(history, err)
            })?;
        self.advance(history, BuildState::ArtifactsExtracted)?;

        let result = locate_artifact(output_dir, suffix).map_err(scan_err)?;

        let Some(artifact) = result.path else {
            history.push(BuildState::ArtifactMissing);
            tracing::error!(
                dir = %output_dir.display(),
                suffix = %suffix,
                "no artifact found in the container output"
            );
            return Err(BuildError::ArtifactMissing {
                dir: output_dir.clone(),
                suffix: suffix.clone(),
            });
        };

        let predates_run = result.candidates > 1 && before.contains(&artifact);
        if result.candidates > 1 {
            tracing::warn!(
                count = result.candidates,
                chosen = %artifact.display(),
                modified = %modified_utc(&artifact),
                "multiple '*{}' files in output directory; using the first one listed",
                suffix
            );
        }
        if predates_run {
            tracing::warn!(
                chosen = %artifact.display(),
                "chosen artifact was already present before extraction and may come from an \
                 earlier build; clear the output directory to avoid this"
            );
        }
        history.push(BuildState::ArtifactFound);
        tracing::info!(artifact = %artifact.display(), "artifact found");

        let mut located = Located {
            artifact,
            candidates: result.candidates,
            predates_run,
            digest: None,
            checksum_file: None,
            manifest_file: None,
        };
        if self.config.write_manifest {
            self.record_outputs(&mut located, request, image, started_at)?;
        }
        Ok(located)
    }

    fn record_outputs(
        &self,
        located: &mut Located,
        request: &BuildRequest,
        image: &ImageId,
        started_at: &str,
    ) -> Result<(), BuildError> {
        let artifact = located.artifact.clone();
        let outputs_err = |source| BuildError::Outputs {
            path: artifact.clone(),
            source,
        };

        let digest = sha256_file(&artifact).map_err(outputs_err)?;
        let checksum_file = write_checksum_sidecar(&artifact, &digest).map_err(outputs_err)?;

        let manifest = BuildManifest {
            library_version: request.library_version.clone(),
            image: image.to_string(),
            engine: self.engine.program().to_string(),
            artifact: file_name(&artifact),
            sha256: digest.sha256.clone(),
            size_bytes: digest.size_bytes,
            started_at_utc: started_at.to_string(),
            finished_at_utc: now_utc_rfc3339(),
            candidates: located.candidates,
            artifact_predates_run: located.predates_run,
        };
        let manifest_file =
            write_manifest(&request.output_directory, &manifest).map_err(outputs_err)?;
        tracing::debug!(
            sha256 = %digest.sha256,
            manifest = %manifest_file.display(),
            "recorded build outputs"
        );

        located.digest = Some(digest);
        located.checksum_file = Some(checksum_file);
        located.manifest_file = Some(manifest_file);
        Ok(())
    }

    /// A step that fails after Ctrl-C most likely died from the same SIGINT,
    /// so it is reported as an interruption at the last state reached.
    fn interrupted_or(&self, history: &[BuildState], err: BuildError) -> BuildError {
        if !self.cancel.is_cancelled() {
            return err;
        }
        let state = history.last().copied().unwrap_or(BuildState::Idle);
        tracing::warn!(%state, error = %err, "step failed after interrupt");
        BuildError::Interrupted { state }
    }

    /// Record a reached state, then stop if Ctrl-C was seen.
    fn advance(&self, history: &mut Vec<BuildState>, state: BuildState) -> Result<(), BuildError> {
        history.push(state);
        tracing::debug!(%state, "state reached");
        if self.cancel.is_cancelled() {
            tracing::warn!(%state, "interrupted");
            return Err(BuildError::Interrupted { state });
        }
        Ok(())
    }
}

/// Modification time of `path` as RFC 3339, or `unknown`.
fn modified_utc(path: &Path) -> String {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|mtime| OffsetDateTime::from(mtime).format(&Rfc3339).ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
