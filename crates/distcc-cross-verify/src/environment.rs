//! Execution environment abstraction
//!
//! The verifier never calls `uname`, `which` or `make` directly: it goes
//! through [`Environment`] so the checks can be driven by
//! [`FakeEnvironment`] in tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

/// Exit status of a finished command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    /// Exit code, None if terminated by a signal
    pub code: Option<i32>,
}

impl CommandStatus {
    pub fn exited(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Captured output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub status: CommandStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        let mut combined = self.stdout.clone();
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&self.stderr);
        combined
    }

    /// Last non-empty line of the combined output
    pub fn last_line(&self) -> Option<String> {
        self.combined()
            .lines()
            .rev()
            .map(str::trim_end)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }
}

/// Capabilities the verification checks need from the running system
pub trait Environment {
    /// Machine identifier as reported by `uname -m`
    fn machine(&self) -> io::Result<String>;

    /// Resolve a program name against PATH without following symlinks
    fn resolve(&self, program: &str) -> Option<PathBuf>;

    /// Run a command and capture its output
    fn capture(&self, program: &str, args: &[&str]) -> io::Result<CapturedOutput>;

    /// Run a command in `cwd` with output streamed to the terminal
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> io::Result<CommandStatus>;
}

/// The real system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn machine(&self) -> io::Result<String> {
        let output = self.capture("uname", &["-m"])?;
        if !output.status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("uname -m failed with {}", output.status),
            ));
        }
        Ok(output.stdout.trim().to_string())
    }

    fn resolve(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    fn capture(&self, program: &str, args: &[&str]) -> io::Result<CapturedOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;
        Ok(CapturedOutput {
            status: CommandStatus { code: output.status.code() },
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> io::Result<CommandStatus> {
        let status = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .status()?;
        Ok(CommandStatus { code: status.code() })
    }
}

/// Scripted environment for tests
///
/// Commands without a scripted result succeed with empty output.
#[derive(Debug, Default)]
pub struct FakeEnvironment {
    machine: String,
    resolved: HashMap<String, PathBuf>,
    captures: HashMap<String, CapturedOutput>,
    run_codes: HashMap<String, i32>,
    calls: Mutex<Vec<String>>,
}

impl FakeEnvironment {
    pub fn new(machine: impl Into<String>) -> Self {
        Self {
            machine: machine.into(),
            ..Self::default()
        }
    }

    /// A container where ccache wraps every compiler and distcc sits underneath
    pub fn healthy(machine: impl Into<String>) -> Self {
        Self::new(machine)
            .with_resolved("gcc", "/usr/lib/ccache/gcc")
            .with_resolved("g++", "/usr/lib/ccache/g++")
            .with_resolved("cc", "/usr/lib/ccache/cc")
            .with_capture(
                "gcc",
                CapturedOutput {
                    status: CommandStatus::exited(1),
                    stdout: String::new(),
                    stderr: "gcc: fatal error: no input files\ncompilation terminated.\n\
                             distcc[42] ERROR: compile (null) on localhost failed\n"
                        .to_string(),
                },
            )
    }

    pub fn with_resolved(mut self, program: &str, path: impl Into<PathBuf>) -> Self {
        self.resolved.insert(program.to_string(), path.into());
        self
    }

    pub fn with_capture(mut self, program: &str, output: CapturedOutput) -> Self {
        self.captures.insert(program.to_string(), output);
        self
    }

    /// Script the exit code of `program args...` (matched on the joined command line)
    pub fn with_run_code(mut self, command_line: &str, code: i32) -> Self {
        self.run_codes.insert(command_line.to_string(), code);
        self
    }

    /// Command lines passed to `capture` and `run`, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, program: &str, args: &[&str]) -> String {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }
        line
    }
}

impl Environment for FakeEnvironment {
    fn machine(&self) -> io::Result<String> {
        Ok(self.machine.clone())
    }

    fn resolve(&self, program: &str) -> Option<PathBuf> {
        self.resolved.get(program).cloned()
    }

    fn capture(&self, program: &str, args: &[&str]) -> io::Result<CapturedOutput> {
        self.record(program, args);
        Ok(self.captures.get(program).cloned().unwrap_or(CapturedOutput {
            status: CommandStatus::exited(0),
            stdout: String::new(),
            stderr: String::new(),
        }))
    }

    fn run(&self, program: &str, args: &[&str], _cwd: &Path) -> io::Result<CommandStatus> {
        let line = self.record(program, args);
        Ok(CommandStatus::exited(self.run_codes.get(&line).copied().unwrap_or(0)))
    }
}
