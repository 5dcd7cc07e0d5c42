//! Builder configuration.
//!
//! Resolved exactly once per invocation, in this order (later wins):
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, else `./pyiec61850-builder.toml`, else the
//!    per-user `<config dir>/pyiec61850-builder/config.toml`)
//! 3. the `LIBIEC61850_VERSION` environment variable (version only)
//! 4. command-line overrides
//!
//! The result is an immutable [`BuilderConfig`]; nothing downstream reads the
//! environment or the file again.
//!
//! ```toml
//! library_version = "v1.6"
//!
//! [engine]
//! program = "podman"
//!
//! [image]
//! tag = "pyiec61850-builder"
//! context = "."
//! dockerfile = "docker/Dockerfile"
//! build_args = { PYTHON_VERSION = "3.11" }
//!
//! [artifact]
//! container_dir = "/wheels"
//! suffix = ".whl"
//!
//! [output]
//! dir = "dist"
//! manifest = true
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::{DEFAULT_ARTIFACT_SUFFIX, DEFAULT_OUTPUT_DIR};
use crate::builder::BuildRequest;
use crate::engine::{ImageBuildSpec, DEFAULT_ENGINE, VERSION_BUILD_ARG};

/// Upstream libiec61850 version built when nothing else is requested.
pub const DEFAULT_LIBRARY_VERSION: &str = "v1.6";

/// Environment variable selecting the upstream version.
pub const VERSION_ENV: &str = "LIBIEC61850_VERSION";

pub const DEFAULT_IMAGE_TAG: &str = "pyiec61850-builder";

/// Directory inside the image where the build leaves its wheels.
pub const DEFAULT_CONTAINER_DIR: &str = "/wheels";

/// Project-local config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "pyiec61850-builder.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderConfig {
    pub library_version: String,
    pub engine: String,
    pub image_tag: String,
    pub context: PathBuf,
    pub dockerfile: Option<PathBuf>,
    /// Extra `--build-arg` pairs passed after the version.
    pub build_args: BTreeMap<String, String>,
    pub container_dir: String,
    pub artifact_suffix: String,
    pub output_dir: PathBuf,
    pub write_manifest: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            library_version: DEFAULT_LIBRARY_VERSION.to_string(),
            engine: DEFAULT_ENGINE.to_string(),
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            context: PathBuf::from("."),
            dockerfile: None,
            build_args: BTreeMap::new(),
            container_dir: DEFAULT_CONTAINER_DIR.to_string(),
            artifact_suffix: DEFAULT_ARTIFACT_SUFFIX.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            write_manifest: true,
        }
    }
}

impl BuilderConfig {
    pub fn request(&self) -> BuildRequest {
        BuildRequest {
            library_version: self.library_version.clone(),
            output_directory: self.output_dir.clone(),
        }
    }

    /// Image build parameters; the version build arg always comes first.
    pub fn image_build_spec(&self) -> ImageBuildSpec {
        let mut build_args = vec![(
            VERSION_BUILD_ARG.to_string(),
            self.library_version.clone(),
        )];
        build_args.extend(
            self.build_args
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        ImageBuildSpec {
            tag: self.image_tag.clone(),
            context: self.context.clone(),
            dockerfile: self.dockerfile.clone(),
            build_args,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.library_version.trim().is_empty() {
            bail!("library version must not be empty");
        }
        if self.engine.trim().is_empty() {
            bail!("container engine program must not be empty");
        }
        if self.image_tag.is_empty() || self.image_tag.chars().any(char::is_whitespace) {
            bail!(
                "invalid image tag '{}': must be non-empty and contain no whitespace",
                self.image_tag
            );
        }
        if !self.container_dir.starts_with('/') {
            bail!(
                "artifact container_dir must be an absolute path inside the image, got '{}'",
                self.container_dir
            );
        }
        if self.artifact_suffix.is_empty() {
            bail!("artifact suffix must not be empty");
        }
        if self.build_args.contains_key(VERSION_BUILD_ARG) {
            bail!(
                "build_args must not set {}; use library_version or {} instead",
                VERSION_BUILD_ARG,
                VERSION_ENV
            );
        }
        Ok(())
    }
}

/// Command-line overrides; `None` leaves the lower layer in place.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub library_version: Option<String>,
    pub engine: Option<String>,
    pub image_tag: Option<String>,
    pub context: Option<PathBuf>,
    pub dockerfile: Option<PathBuf>,
    pub container_dir: Option<String>,
    pub artifact_suffix: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub no_manifest: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    library_version: Option<String>,
    engine: Option<EngineToml>,
    image: Option<ImageToml>,
    artifact: Option<ArtifactToml>,
    output: Option<OutputToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineToml {
    program: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImageToml {
    tag: Option<String>,
    context: Option<String>,
    dockerfile: Option<String>,
    build_args: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArtifactToml {
    container_dir: Option<String>,
    suffix: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OutputToml {
    dir: Option<String>,
    manifest: Option<bool>,
}

/// Read the version from the environment. Blank values count as unset.
pub fn env_library_version() -> Option<String> {
    std::env::var(VERSION_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Per-user config file location, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pyiec61850-builder").join("config.toml"))
}

/// Pick the config file to load, if any.
pub fn discover_config_file(cwd: &Path, explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            bail!("config file '{}' does not exist", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = cwd.join(CONFIG_FILENAME);
    if local.is_file() {
        return Ok(Some(local));
    }

    Ok(user_config_path().filter(|path| path.is_file()))
}

/// Resolve the final configuration from all layers.
///
/// `env_version` is passed in rather than read here so callers decide when
/// the environment is consulted.
pub fn resolve(
    config_file: Option<&Path>,
    env_version: Option<String>,
    overrides: &Overrides,
) -> Result<BuilderConfig> {
    let mut config = BuilderConfig::default();

    if let Some(path) = config_file {
        apply_file(&mut config, path)?;
    }

    if let Some(version) = env_version {
        config.library_version = version;
    }

    apply_overrides(&mut config, overrides);
    config.validate()?;
    Ok(config)
}

fn apply_file(config: &mut BuilderConfig, path: &Path) -> Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading builder config '{}'", path.display()))?;
    let parsed: ConfigToml = toml::from_str(&raw)
        .with_context(|| format!("parsing builder config '{}'", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    if let Some(version) = parsed.library_version {
        config.library_version = version.trim().to_string();
    }
    if let Some(program) = parsed.engine.and_then(|engine| engine.program) {
        config.engine = program;
    }
    if let Some(image) = parsed.image {
        if let Some(tag) = image.tag {
            config.image_tag = tag;
        }
        if let Some(context) = image.context {
            config.context = resolve_relative(base_dir, &context);
        }
        if let Some(dockerfile) = image.dockerfile {
            config.dockerfile = Some(resolve_relative(base_dir, &dockerfile));
        }
        if let Some(build_args) = image.build_args {
            config.build_args = build_args;
        }
    }
    if let Some(artifact) = parsed.artifact {
        if let Some(container_dir) = artifact.container_dir {
            config.container_dir = container_dir;
        }
        if let Some(suffix) = artifact.suffix {
            config.artifact_suffix = suffix;
        }
    }
    if let Some(output) = parsed.output {
        if let Some(dir) = output.dir {
            config.output_dir = resolve_relative(base_dir, &dir);
        }
        if let Some(manifest) = output.manifest {
            config.write_manifest = manifest;
        }
    }
    Ok(())
}

fn apply_overrides(config: &mut BuilderConfig, overrides: &Overrides) {
    if let Some(version) = &overrides.library_version {
        config.library_version = version.trim().to_string();
    }
    if let Some(engine) = &overrides.engine {
        config.engine = engine.clone();
    }
    if let Some(tag) = &overrides.image_tag {
        config.image_tag = tag.clone();
    }
    if let Some(context) = &overrides.context {
        config.context = context.clone();
    }
    if let Some(dockerfile) = &overrides.dockerfile {
        config.dockerfile = Some(dockerfile.clone());
    }
    if let Some(container_dir) = &overrides.container_dir {
        config.container_dir = container_dir.clone();
    }
    if let Some(suffix) = &overrides.artifact_suffix {
        config.artifact_suffix = suffix.clone();
    }
    if let Some(output_dir) = &overrides.output_dir {
        config.output_dir = output_dir.clone();
    }
    if overrides.no_manifest {
        config.write_manifest = false;
    }
}

fn resolve_relative(base_dir: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILENAME);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn defaults_use_pinned_version() {
        let config = resolve(None, None, &Overrides::default()).unwrap();
        assert_eq!(config.library_version, "v1.6");
        assert_eq!(config.image_tag, "pyiec61850-builder");
        assert_eq!(config.container_dir, "/wheels");
        assert_eq!(config.artifact_suffix, ".whl");
        assert_eq!(config.output_dir, PathBuf::from("dist"));

        let spec = config.image_build_spec();
        assert_eq!(
            spec.build_args,
            vec![("LIBIEC61850_VERSION".to_string(), "v1.6".to_string())]
        );
    }

    #[test]
    fn env_overrides_file_and_flag_overrides_env() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), "library_version = \"v1.5.3\"\n");

        let from_file = resolve(Some(path.as_path()), None, &Overrides::default()).unwrap();
        assert_eq!(from_file.library_version, "v1.5.3");

        let from_env = resolve(Some(path.as_path()), Some("v1.6.1".to_string()), &Overrides::default())
            .unwrap();
        assert_eq!(from_env.library_version, "v1.6.1");

        let overrides = Overrides {
            library_version: Some("v1.6".to_string()),
            ..Default::default()
        };
        let from_flag = resolve(Some(path.as_path()), Some("v1.6.1".to_string()), &overrides).unwrap();
        assert_eq!(from_flag.library_version, "v1.6");
    }

    #[test]
    fn file_paths_resolve_against_file_directory() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"
[engine]
program = "podman"

[image]
tag = "custom-builder"
context = "docker"
dockerfile = "docker/Containerfile"
build_args = { PYTHON_VERSION = "3.11" }

[artifact]
container_dir = "/out"
suffix = ".tar.gz"

[output]
dir = "/tmp/wheels"
manifest = false
"#,
        );

        let config = resolve(Some(path.as_path()), None, &Overrides::default()).unwrap();
        assert_eq!(config.engine, "podman");
        assert_eq!(config.image_tag, "custom-builder");
        assert_eq!(config.context, temp.path().join("docker"));
        assert_eq!(
            config.dockerfile,
            Some(temp.path().join("docker/Containerfile"))
        );
        assert_eq!(config.container_dir, "/out");
        assert_eq!(config.artifact_suffix, ".tar.gz");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/wheels"));
        assert!(!config.write_manifest);

        let spec = config.image_build_spec();
        assert_eq!(spec.build_args[0].0, "LIBIEC61850_VERSION");
        assert_eq!(spec.build_arg("PYTHON_VERSION"), Some("3.11"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), "[image]\ntags = \"oops\"\n");
        let err = resolve(Some(path.as_path()), None, &Overrides::default()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing builder config"));
    }

    #[test]
    fn version_build_arg_cannot_be_smuggled_in() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            "[image]\nbuild_args = { LIBIEC61850_VERSION = \"v0.1\" }\n",
        );
        assert!(resolve(Some(path.as_path()), None, &Overrides::default()).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let relative_dir = Overrides {
            container_dir: Some("wheels".to_string()),
            ..Default::default()
        };
        assert!(resolve(None, None, &relative_dir).is_err());

        let bad_tag = Overrides {
            image_tag: Some("two words".to_string()),
            ..Default::default()
        };
        assert!(resolve(None, None, &bad_tag).is_err());

        let blank_version = Overrides {
            library_version: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(resolve(None, None, &blank_version).is_err());
    }

    #[test]
    fn explicit_config_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");
        assert!(discover_config_file(temp.path(), Some(missing.as_path())).is_err());
    }

    #[test]
    fn local_config_is_discovered() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), "");
        assert_eq!(
            discover_config_file(temp.path(), None).unwrap(),
            Some(path)
        );
    }

    #[test]
    #[serial]
    fn env_version_reads_variable() {
        temp_env::with_var(VERSION_ENV, Some("v1.5.2"), || {
            assert_eq!(env_library_version(), Some("v1.5.2".to_string()));
        });
    }

    #[test]
    #[serial]
    fn blank_env_version_is_unset() {
        temp_env::with_var(VERSION_ENV, Some("  "), || {
            assert_eq!(env_library_version(), None);
        });
        temp_env::with_var_unset(VERSION_ENV, || {
            assert_eq!(env_library_version(), None);
        });
    }
}
