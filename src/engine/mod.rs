//! Container engine abstraction.
//!
//! The orchestrator never shells out directly. It talks to a
//! [`ContainerEngine`], which has one real implementation
//! ([`CliEngine`], any docker-compatible CLI) and is faked in tests.

mod cli;

pub use cli::CliEngine;

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::process::CmdError;

/// Docker-compatible engine used when nothing else is configured.
pub const DEFAULT_ENGINE: &str = "docker";

/// Build argument carrying the upstream library version into the image build.
pub const VERSION_BUILD_ARG: &str = "LIBIEC61850_VERSION";

/// Identifier (tag) of a built image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a created (not running) container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, the way engines print ids in listings.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything an image build needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuildSpec {
    /// Tag given to the resulting image.
    pub tag: String,
    /// Build context directory.
    pub context: PathBuf,
    /// Containerfile/Dockerfile; engine default (`<context>/Dockerfile`) when `None`.
    pub dockerfile: Option<PathBuf>,
    /// `--build-arg` pairs, in order.
    pub build_args: Vec<(String, String)>,
}

impl ImageBuildSpec {
    /// Value of a build argument, if present.
    pub fn build_arg(&self, key: &str) -> Option<&str> {
        self.build_args
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("container engine '{program}' not found on PATH")]
    NotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error(transparent)]
    Command(#[from] CmdError),

    #[error("`{command}` succeeded but printed no container id")]
    EmptyContainerId { command: String },

    /// Raised by non-CLI engines (test doubles) that need a free-form reason.
    #[error("{0}")]
    Other(String),
}

/// Narrow view of a container engine: exactly the operations a build needs.
pub trait ContainerEngine {
    /// Program name or path, for diagnostics.
    fn program(&self) -> &str;

    /// Probe the engine. Returns its version banner.
    fn version(&self) -> Result<String, EngineError>;

    fn build_image(&self, spec: &ImageBuildSpec) -> Result<ImageId, EngineError>;

    fn create_container(&self, image: &ImageId) -> Result<ContainerId, EngineError>;

    /// Copy the *contents* of `src_dir` inside the container into `dest`.
    fn copy_out(
        &self,
        container: &ContainerId,
        src_dir: &str,
        dest: &Path,
    ) -> Result<(), EngineError>;

    fn remove_container(&self, container: &ContainerId) -> Result<(), EngineError>;
}

impl<E: ContainerEngine + ?Sized> ContainerEngine for &E {
    fn program(&self) -> &str {
        (**self).program()
    }

    fn version(&self) -> Result<String, EngineError> {
        (**self).version()
    }

    fn build_image(&self, spec: &ImageBuildSpec) -> Result<ImageId, EngineError> {
        (**self).build_image(spec)
    }

    fn create_container(&self, image: &ImageId) -> Result<ContainerId, EngineError> {
        (**self).create_container(image)
    }

    fn copy_out(
        &self,
        container: &ContainerId,
        src_dir: &str,
        dest: &Path,
    ) -> Result<(), EngineError> {
        (**self).copy_out(container, src_dir, dest)
    }

    fn remove_container(&self, container: &ContainerId) -> Result<(), EngineError> {
        (**self).remove_container(container)
    }
}
