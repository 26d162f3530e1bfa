//! Process execution seam
//!
//! Every docker/compose invocation goes through [`ProcessRunner`] so the
//! orchestration logic can be exercised against a recording fake.

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

/// A command line to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Build from a program-plus-arguments prefix (e.g., `["docker", "compose"]`)
    pub fn from_prefix(prefix: &[String]) -> Option<Self> {
        let (program, rest) = prefix.split_first()?;
        Some(Self::new(program.clone()).args(rest.iter().cloned()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Space-joined command line, for logs and test assertions
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Exit status of a finished process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStatus {
    /// Exit code, None if killed by a signal
    pub code: Option<i32>,
}

impl ProcessStatus {
    pub fn exited(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Captured stdout of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: ProcessStatus,
    pub stdout: String,
}

/// Process errors (the process could not be run at all)
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Capability to run external programs
pub trait ProcessRunner: Send + Sync {
    /// Run with stdout/stderr streamed to the terminal
    fn run(&self, command: &CommandSpec) -> Result<ProcessStatus, ProcessError>;

    /// Run and capture stdout; stderr still streams
    fn capture(&self, command: &CommandSpec) -> Result<ProcessOutput, ProcessError>;

    /// Whether `program` resolves on PATH
    fn tool_exists(&self, program: &str) -> bool;

    /// Block for `duration` between dependent commands
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Runs real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        cmd
    }

    fn spawn_error(spec: &CommandSpec, source: io::Error) -> ProcessError {
        ProcessError::Spawn {
            command: spec.command_line(),
            source,
        }
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, command: &CommandSpec) -> Result<ProcessStatus, ProcessError> {
        tracing::debug!(command = %command, "exec");
        let status = Self::command(command)
            .status()
            .map_err(|e| Self::spawn_error(command, e))?;
        Ok(ProcessStatus { code: status.code() })
    }

    fn capture(&self, command: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        tracing::debug!(command = %command, "exec (captured)");
        let output = Self::command(command)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| Self::spawn_error(command, e))?;
        Ok(ProcessOutput {
            status: ProcessStatus {
                code: output.status.code(),
            },
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }

    fn tool_exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}
