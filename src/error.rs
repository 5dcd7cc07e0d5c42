//! Build failure taxonomy and its mapping to process exit codes.

use std::path::PathBuf;

use thiserror::Error;

use crate::builder::BuildState;
use crate::engine::{ContainerId, EngineError};

/// Exit code for configuration and usage errors.
pub const EXIT_USAGE: u8 = 2;
/// Exit code when the container engine is missing or not runnable.
pub const EXIT_TOOL_UNAVAILABLE: u8 = 3;
/// Exit code when an external step (build, create, copy, remove) or an
/// output write fails.
pub const EXIT_EXTERNAL: u8 = 4;
/// Exit code when the tools succeeded but no artifact was produced.
pub const EXIT_ARTIFACT_MISSING: u8 = 5;
/// Exit code after Ctrl-C.
pub const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(
        "container engine '{program}' is required to build this package; install it and try again"
    )]
    ToolUnavailable {
        program: String,
        #[source]
        source: EngineError,
    },

    #[error("image build failed")]
    ImageBuild(#[source] EngineError),

    #[error("container creation failed")]
    ContainerCreate(#[source] EngineError),

    #[error("preparing output directory '{}'", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("copying artifacts out of container {container} failed")]
    Extraction {
        container: ContainerId,
        #[source]
        source: EngineError,
    },

    #[error("scanning output directory '{}'", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("no '*{suffix}' file found in '{}' after extraction", dir.display())]
    ArtifactMissing { dir: PathBuf, suffix: String },

    #[error("writing build outputs for '{}'", path.display())]
    Outputs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("interrupted after reaching state {state}")]
    Interrupted { state: BuildState },

    #[error("removing container {container} failed")]
    Cleanup {
        container: ContainerId,
        #[source]
        source: EngineError,
    },

    /// A step failed and removing the container afterwards failed too.
    #[error(
        "{}; additionally, removing container {} failed: {}",
        error_chain(.primary),
        .container,
        error_chain(.cleanup)
    )]
    WithCleanup {
        primary: Box<BuildError>,
        container: ContainerId,
        cleanup: EngineError,
    },
}

impl BuildError {
    /// Process exit code for this failure.
    ///
    /// A cleanup failure that accompanies another failure never changes the
    /// code of the original one.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ToolUnavailable { .. } => EXIT_TOOL_UNAVAILABLE,
            Self::ImageBuild(_)
            | Self::ContainerCreate(_)
            | Self::OutputDir { .. }
            | Self::Extraction { .. }
            | Self::Scan { .. }
            | Self::Outputs { .. }
            | Self::Cleanup { .. } => EXIT_EXTERNAL,
            Self::ArtifactMissing { .. } => EXIT_ARTIFACT_MISSING,
            Self::Interrupted { .. } => EXIT_INTERRUPTED,
            Self::WithCleanup { primary, .. } => primary.exit_code(),
        }
    }

    /// The failure that ended the run, ignoring any accompanying cleanup failure.
    pub fn primary(&self) -> &BuildError {
        match self {
            Self::WithCleanup { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// Attach a cleanup failure to this error.
    pub(crate) fn with_cleanup(self, container: ContainerId, cleanup: EngineError) -> Self {
        Self::WithCleanup {
            primary: Box::new(self),
            container,
            cleanup,
        }
    }
}

/// `err` followed by each of its causes, joined the way `{:#}` joins an
/// anyhow chain. `WithCleanup` carries two chains, so neither can be the
/// single `source`.
fn error_chain<E: std::error::Error + ?Sized>(err: &E) -> String {
    let mut rendered = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        rendered.push_str(": ");
        rendered.push_str(&inner.to_string());
        cause = inner.source();
    }
    rendered
}
