use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pyiec61850_builder::artifact::manifest::load_manifest;
use pyiec61850_builder::config::{self, BuilderConfig, Overrides};
use pyiec61850_builder::error::{BuildError, EXIT_ARTIFACT_MISSING, EXIT_USAGE};
use pyiec61850_builder::preflight::check_tool_available;
use pyiec61850_builder::{locate_artifact, ArtifactBuilder, CancelFlag, CliEngine};

/// Build the pyiec61850 wheel inside a container and copy it out.
#[derive(Parser)]
#[command(name = "pyiec61850-builder")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ./pyiec61850-builder.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the image, extract the wheel, clean up (default)
    Build(BuildArgs),

    /// Only check that the container engine is available
    Check {
        /// Container engine program or path
        #[arg(long)]
        engine: Option<String>,
    },

    /// Only look for a built artifact in a directory
    Locate {
        /// Directory to scan (default: the configured output directory)
        dir: Option<PathBuf>,

        /// File name suffix to look for
        #[arg(long)]
        suffix: Option<String>,
    },
}

#[derive(Args, Default)]
struct BuildArgs {
    /// Upstream libiec61850 version (overrides LIBIEC61850_VERSION)
    #[arg(long)]
    library_version: Option<String>,

    /// Where the wheel is copied to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Container engine program or path (docker, podman, ...)
    #[arg(long)]
    engine: Option<String>,

    /// Image tag
    #[arg(long)]
    tag: Option<String>,

    /// Image build context
    #[arg(long)]
    context: Option<PathBuf>,

    /// Dockerfile/Containerfile to build from
    #[arg(short = 'f', long)]
    dockerfile: Option<PathBuf>,

    /// Directory inside the image holding the built wheels
    #[arg(long)]
    container_dir: Option<String>,

    /// Artifact file name suffix
    #[arg(long)]
    suffix: Option<String>,

    /// Do not write the checksum sidecar and build manifest
    #[arg(long)]
    no_manifest: bool,
}

impl From<BuildArgs> for Overrides {
    fn from(args: BuildArgs) -> Self {
        Overrides {
            library_version: args.library_version,
            engine: args.engine,
            image_tag: args.tag,
            context: args.context,
            dockerfile: args.dockerfile,
            container_dir: args.container_dir,
            artifact_suffix: args.suffix,
            output_dir: args.output_dir,
            no_manifest: args.no_manifest,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

/// Returns the process exit code. `Err` is reserved for configuration and
/// usage problems; build failures are reported here and mapped to their code.
fn run(cli: Cli) -> Result<u8> {
    let command = cli
        .command
        .unwrap_or_else(|| Commands::Build(BuildArgs::default()));

    match command {
        Commands::Build(args) => cmd_build(cli.config, args.into()),
        Commands::Check { engine } => cmd_check(
            cli.config,
            Overrides {
                engine,
                ..Default::default()
            },
        ),
        Commands::Locate { dir, suffix } => cmd_locate(
            cli.config,
            dir,
            Overrides {
                artifact_suffix: suffix,
                ..Default::default()
            },
        ),
    }
}

fn load_config(explicit: Option<PathBuf>, overrides: &Overrides) -> Result<BuilderConfig> {
    let cwd = std::env::current_dir().context("resolving current directory")?;
    let config_file = config::discover_config_file(&cwd, explicit.as_deref())?;
    if let Some(path) = &config_file {
        tracing::debug!(config = %path.display(), "using config file");
    }
    config::resolve(
        config_file.as_deref(),
        config::env_library_version(),
        overrides,
    )
}

fn cmd_build(explicit_config: Option<PathBuf>, overrides: Overrides) -> Result<u8> {
    let config = load_config(explicit_config, &overrides)?;

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, stopping after the current step");
        handler_flag.cancel();
    })
    .context("installing Ctrl-C handler")?;

    let engine = CliEngine::new(config.engine.clone());
    let builder = ArtifactBuilder::new(engine, config).with_cancel_flag(cancel);

    match builder.run() {
        Ok(report) => {
            println!("Built wheel: {}", report.artifact.display());
            if let Some(digest) = &report.digest {
                println!("  SHA256: {}", digest.sha256);
            }
            Ok(0)
        }
        Err(err) => Ok(report_failure(err)),
    }
}

fn cmd_check(explicit_config: Option<PathBuf>, overrides: Overrides) -> Result<u8> {
    let config = load_config(explicit_config, &overrides)?;
    let engine = CliEngine::new(config.engine);

    match check_tool_available(&engine) {
        Ok(version) => {
            println!("{version}");
            Ok(0)
        }
        Err(err) => Ok(report_failure(err)),
    }
}

fn cmd_locate(
    explicit_config: Option<PathBuf>,
    dir: Option<PathBuf>,
    overrides: Overrides,
) -> Result<u8> {
    let config = load_config(explicit_config, &overrides)?;
    let dir = dir.unwrap_or(config.output_dir);
    if !dir.is_dir() {
        eprintln!("Output directory '{}' does not exist", dir.display());
        return Ok(EXIT_ARTIFACT_MISSING);
    }

    let result = locate_artifact(&dir, &config.artifact_suffix)
        .with_context(|| format!("scanning '{}'", dir.display()))?;

    let Some(path) = result.path else {
        eprintln!(
            "No '*{}' file found in '{}'",
            config.artifact_suffix,
            dir.display()
        );
        return Ok(EXIT_ARTIFACT_MISSING);
    };

    if result.candidates > 1 {
        tracing::warn!(
            count = result.candidates,
            "multiple matching files; showing the first one listed"
        );
    }
    println!("{}", path.display());

    let recorded = load_manifest(&dir).ok().filter(|manifest| {
        path.file_name() == Some(std::ffi::OsStr::new(&manifest.artifact))
    });
    if let Some(manifest) = recorded {
        println!(
            "  built from libiec61850 {} at {} (sha256 {})",
            manifest.library_version, manifest.finished_at_utc, manifest.sha256
        );
        if manifest.artifact_predates_run {
            println!("  note: this file predates that build and may come from an earlier one");
        }
    }
    Ok(0)
}

fn report_failure(err: BuildError) -> u8 {
    let code = err.exit_code();
    eprintln!("error: {:#}", anyhow::Error::from(err));
    code
}
