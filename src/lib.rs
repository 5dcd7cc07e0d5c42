//! Containerized build of the pyiec61850 wheel.
//!
//! The Python bindings for libiec61850 are compiled inside a container image
//! so the host needs nothing but a container engine. This crate drives that
//! build and brings the wheel back out:
//!
//! - **Preflight** - the engine must be installed and runnable
//! - **Engine** - `ContainerEngine` trait and the docker-compatible CLI backend
//! - **Builder** - the build state machine and the container cleanup guard
//! - **Artifact** - locating the wheel, checksums and the build manifest
//! - **Config** - defaults, TOML file, `LIBIEC61850_VERSION`, CLI overrides
//!
//! # Architecture
//!
//! ```text
//! pyiec61850-builder (bin)
//!     │
//!     ├── config::resolve ─────────── BuilderConfig (immutable for the run)
//!     │
//!     └── ArtifactBuilder<CliEngine>
//!             ├── preflight::check_tool_available
//!             ├── engine.build_image  (--build-arg LIBIEC61850_VERSION=...)
//!             ├── engine.create_container ── ContainerGuard (rm on every path)
//!             ├── engine.copy_out      (/wheels/. -> dist/)
//!             └── artifact::locate_artifact (+ checksum, manifest)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use pyiec61850_builder::{config, ArtifactBuilder, CliEngine};
//!
//! let config = config::resolve(None, config::env_library_version(), &Default::default())?;
//! let engine = CliEngine::new(config.engine.clone());
//! let report = ArtifactBuilder::new(engine, config).run()?;
//! println!("Built wheel: {}", report.artifact.display());
//! ```

pub mod artifact;
pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod preflight;
pub mod process;

pub use artifact::{locate_artifact, ArtifactResult};
pub use builder::{ArtifactBuilder, BuildReport, BuildRequest, BuildState, CancelFlag};
pub use config::BuilderConfig;
pub use engine::{CliEngine, ContainerEngine, ContainerId, ImageId};
pub use error::BuildError;
