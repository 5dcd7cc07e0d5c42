use std::path::Path;

use super::{ContainerEngine, ContainerId, EngineError, ImageBuildSpec, ImageId};
use crate::process::Cmd;

/// Docker-compatible command-line engine (`docker`, `podman`, ...).
#[derive(Debug, Clone)]
pub struct CliEngine {
    program: String,
}

impl CliEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn cmd(&self) -> Cmd {
        Cmd::new(&self.program)
    }

    fn build_cmd(&self, spec: &ImageBuildSpec) -> Cmd {
        let mut cmd = self.cmd().args(["build", "-t", spec.tag.as_str()]);
        for (key, value) in &spec.build_args {
            cmd = cmd.arg("--build-arg").arg(format!("{key}={value}"));
        }
        if let Some(dockerfile) = &spec.dockerfile {
            cmd = cmd.arg("-f").arg_path(dockerfile);
        }
        cmd.arg_path(&spec.context)
    }
}

impl ContainerEngine for CliEngine {
    fn program(&self) -> &str {
        &self.program
    }

    fn version(&self) -> Result<String, EngineError> {
        which::which(&self.program).map_err(|source| EngineError::NotFound {
            program: self.program.clone(),
            source,
        })?;

        let result = self
            .cmd()
            .arg("--version")
            .error_msg(format!("'{}' is installed but not runnable", self.program))
            .run()?;
        Ok(result.stdout.trim().to_string())
    }

    fn build_image(&self, spec: &ImageBuildSpec) -> Result<ImageId, EngineError> {
        self.build_cmd(spec)
            .inherit_output()
            .error_msg(format!("building image '{}'", spec.tag))
            .run()?;
        Ok(ImageId::new(spec.tag.clone()))
    }

    fn create_container(&self, image: &ImageId) -> Result<ContainerId, EngineError> {
        let cmd = self.cmd().args(["create", image.as_str()]);
        let command = cmd.display();
        let result = cmd
            .error_msg(format!("creating container from image '{image}'"))
            .run()?;

        // Some engines print pull progress before the id; the id is the last line.
        let id = result
            .stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .unwrap_or_default();
        if id.is_empty() {
            return Err(EngineError::EmptyContainerId { command });
        }
        Ok(ContainerId::new(id))
    }

    fn copy_out(
        &self,
        container: &ContainerId,
        src_dir: &str,
        dest: &Path,
    ) -> Result<(), EngineError> {
        let source = format!("{}:{}/.", container, src_dir.trim_end_matches('/'));
        self.cmd()
            .arg("cp")
            .arg(source)
            .arg_path(dest)
            .error_msg(format!(
                "copying '{}' out of container {}",
                src_dir,
                container.short()
            ))
            .run()?;
        Ok(())
    }

    fn remove_container(&self, container: &ContainerId) -> Result<(), EngineError> {
        self.cmd()
            .args(["rm", container.as_str()])
            .error_msg(format!("removing container {}", container.short()))
            .run()?;
        Ok(())
    }
}
