//! Recording container engine for orchestration tests.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use crate::builder::CancelFlag;
use crate::engine::{ContainerEngine, ContainerId, EngineError, ImageBuildSpec, ImageId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Version,
    Build(ImageBuildSpec),
    Create(ImageId),
    CopyOut {
        container: ContainerId,
        src_dir: String,
        dest: PathBuf,
    },
    Remove(ContainerId),
}

pub(crate) struct FakeEngine {
    pub available: bool,
    pub fail_build: bool,
    pub fail_create: bool,
    pub fail_copy: bool,
    pub fail_remove: bool,
    pub panic_on_copy: bool,
    /// File names `copy_out` writes into the destination.
    pub produces: Vec<String>,
    /// Cancelled while the image builds, as a Ctrl-C would.
    pub cancel_during_build: Option<CancelFlag>,
    pub cancel_during_create: Option<CancelFlag>,
    pub cancel_during_copy: Option<CancelFlag>,
    pub calls: RefCell<Vec<Call>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            available: true,
            fail_build: false,
            fail_create: false,
            fail_copy: false,
            fail_remove: false,
            panic_on_copy: false,
            produces: Vec::new(),
            cancel_during_build: None,
            cancel_during_create: None,
            cancel_during_copy: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn producing(names: &[&str]) -> Self {
        Self {
            produces: names.iter().map(|n| n.to_string()).collect(),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl ContainerEngine for FakeEngine {
    fn program(&self) -> &str {
        "fake-engine"
    }

    fn version(&self) -> Result<String, EngineError> {
        self.record(Call::Version);
        if self.available {
            Ok("fake-engine 1.0".to_string())
        } else {
            Err(EngineError::Other("fake-engine: not installed".to_string()))
        }
    }

    fn build_image(&self, spec: &ImageBuildSpec) -> Result<ImageId, EngineError> {
        self.record(Call::Build(spec.clone()));
        if let Some(cancel) = &self.cancel_during_build {
            cancel.cancel();
        }
        if self.fail_build {
            return Err(EngineError::Other("build step exited with code 1".to_string()));
        }
        Ok(ImageId::new(spec.tag.clone()))
    }

    fn create_container(&self, image: &ImageId) -> Result<ContainerId, EngineError> {
        self.record(Call::Create(image.clone()));
        if let Some(cancel) = &self.cancel_during_create {
            cancel.cancel();
        }
        if self.fail_create {
            return Err(EngineError::Other("no such image".to_string()));
        }
        Ok(ContainerId::new("0123456789abcdef0123"))
    }

    fn copy_out(
        &self,
        container: &ContainerId,
        src_dir: &str,
        dest: &Path,
    ) -> Result<(), EngineError> {
        self.record(Call::CopyOut {
            container: container.clone(),
            src_dir: src_dir.to_string(),
            dest: dest.to_path_buf(),
        });
        if let Some(cancel) = &self.cancel_during_copy {
            cancel.cancel();
        }
        if self.panic_on_copy {
            panic!("copy exploded");
        }
        if self.fail_copy {
            return Err(EngineError::Other(format!("could not find {src_dir}")));
        }
        for name in &self.produces {
            fs::write(dest.join(name), b"PK\x03\x04wheel")
                .map_err(|e| EngineError::Other(e.to_string()))?;
        }
        Ok(())
    }

    fn remove_container(&self, container: &ContainerId) -> Result<(), EngineError> {
        self.record(Call::Remove(container.clone()));
        if self.fail_remove {
            return Err(EngineError::Other(format!(
                "no such container: {}",
                container.short()
            )));
        }
        Ok(())
    }
}
