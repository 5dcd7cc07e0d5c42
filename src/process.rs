//! Thin wrapper around `std::process::Command` for host tool invocations.
//!
//! Every external step of a build goes through [`Cmd`], which gives uniform
//! error messages (the command line, exit code and trimmed stderr) and a
//! single place to log what is being executed.
//!
//! # Example
//!
//! ```rust,ignore
//! use pyiec61850_builder::process::Cmd;
//!
//! let result = Cmd::new("docker")
//!     .arg("--version")
//!     .error_msg("docker is not runnable")
//!     .run()?;
//! println!("{}", result.stdout.trim());
//! ```

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::{Command, Stdio};

use thiserror::Error;

/// Failure to run a host command.
#[derive(Debug, Error)]
pub enum CmdError {
    #[error("{context}: could not execute `{command}`: {source}")]
    Spawn {
        context: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: `{command}` exited with {}{}", exit_label(.code), stderr_suffix(.stderr))]
    Failed {
        context: String,
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n  stderr: {stderr}")
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Builder for a single host command.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    error_msg: Option<String>,
    inherit_output: bool,
}

impl Cmd {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            error_msg: None,
            inherit_output: false,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    /// Message prefixed to the error when the command fails.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    /// Stream stdout/stderr to the terminal instead of capturing them.
    ///
    /// Used for long-running steps (image builds) whose progress the user
    /// wants to see. The returned result has empty `stdout`/`stderr`.
    pub fn inherit_output(mut self) -> Self {
        self.inherit_output = true;
        self
    }

    /// Human-readable command line, for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn run(&self) -> Result<CommandResult, CmdError> {
        let command_line = self.display();
        let context = self
            .error_msg
            .clone()
            .unwrap_or_else(|| "command failed".to_string());
        tracing::debug!(command = %command_line, "running");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null());

        let result = if self.inherit_output {
            let status = cmd
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .map_err(|source| CmdError::Spawn {
                    context: context.clone(),
                    command: command_line.clone(),
                    source,
                })?;
            CommandResult {
                stdout: String::new(),
                stderr: String::new(),
                code: status.code(),
            }
        } else {
            let output = cmd.output().map_err(|source| CmdError::Spawn {
                context: context.clone(),
                command: command_line.clone(),
                source,
            })?;
            CommandResult {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                code: output.status.code(),
            }
        };

        if result.success() {
            return Ok(result);
        }

        Err(CmdError::Failed {
            context,
            command: command_line,
            code: result.code,
            stderr: result.stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let cmd = Cmd::new("docker")
            .args(["build", "-t", "pyiec61850-builder"])
            .arg_path(Path::new("."));
        assert_eq!(cmd.display(), "docker build -t pyiec61850-builder .");
    }

    #[cfg(unix)]
    #[test]
    fn run_captures_stdout() {
        let result = Cmd::new("sh").args(["-c", "echo abc123"]).run().unwrap();
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "abc123");
    }

    #[cfg(unix)]
    #[test]
    fn failure_carries_code_and_stderr() {
        let err = Cmd::new("sh")
            .args(["-c", "echo boom >&2; exit 7"])
            .error_msg("version check failed")
            .run()
            .unwrap_err();
        match &err {
            CmdError::Failed { code, stderr, .. } => {
                assert_eq!(*code, Some(7));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.starts_with("version check failed:"));
        assert!(msg.contains("code 7"));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = Cmd::new("definitely_not_a_real_command_12345")
            .run()
            .unwrap_err();
        assert!(matches!(err, CmdError::Spawn { .. }));
    }
}
