//! Preflight checks run before any container work.
//!
//! Validates that the container engine is present and runnable. This is a
//! hard precondition: nothing is retried and no image or container is
//! touched when it fails.
//!
//! # Example
//!
//! ```rust,ignore
//! use pyiec61850_builder::engine::CliEngine;
//! use pyiec61850_builder::preflight::check_tool_available;
//!
//! let engine = CliEngine::new("docker");
//! match check_tool_available(&engine) {
//!     Ok(version) => println!("{version}"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

use crate::engine::ContainerEngine;
use crate::error::BuildError;

/// Probe the engine, returning its version banner.
pub fn check_tool_available<E: ContainerEngine + ?Sized>(
    engine: &E,
) -> Result<String, BuildError> {
    match engine.version() {
        Ok(version) => {
            tracing::debug!(engine = engine.program(), %version, "container engine available");
            Ok(version)
        }
        Err(source) => Err(BuildError::ToolUnavailable {
            program: engine.program().to_string(),
            source,
        }),
    }
}
