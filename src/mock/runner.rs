//! Recording process runner
//!
//! Records every command line instead of executing it. Exit codes and
//! captured stdout are scripted by command-line prefix; anything unscripted
//! exits 0 with empty output.

use std::collections::HashSet;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use crate::host::{CommandSpec, ProcessError, ProcessOutput, ProcessRunner, ProcessStatus};

#[derive(Debug, Default)]
pub struct RecordingRunner {
    exit_codes: Vec<(String, i32)>,
    stdout: Vec<(String, String)>,
    tools: HashSet<String>,
    missing_programs: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands starting with `prefix` exit with `code`
    pub fn with_exit_code(mut self, prefix: &str, code: i32) -> Self {
        self.exit_codes.push((prefix.to_string(), code));
        self
    }

    /// Captured commands starting with `prefix` print `stdout`
    pub fn with_stdout(mut self, prefix: &str, stdout: &str) -> Self {
        self.stdout.push((prefix.to_string(), stdout.to_string()));
        self
    }

    /// `program` resolves on PATH
    pub fn with_tool(mut self, program: &str) -> Self {
        self.tools.insert(program.to_string());
        self
    }

    /// Spawning `program` fails as if it were not installed
    pub fn with_missing_program(mut self, program: &str) -> Self {
        self.missing_programs.insert(program.to_string());
        self
    }

    /// Recorded command lines (and pauses) in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of recorded calls starting with `prefix`
    pub fn count_matching(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }

    fn record(&self, command: &CommandSpec) -> Result<String, ProcessError> {
        let line = command.command_line();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }
        if self.missing_programs.contains(&command.program) {
            return Err(ProcessError::Spawn {
                command: line,
                source: io::Error::new(io::ErrorKind::NotFound, "program not found"),
            });
        }
        Ok(line)
    }

    fn status_for(&self, line: &str) -> ProcessStatus {
        let code = self
            .exit_codes
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, code)| *code)
            .unwrap_or(0);
        ProcessStatus::exited(code)
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, command: &CommandSpec) -> Result<ProcessStatus, ProcessError> {
        let line = self.record(command)?;
        Ok(self.status_for(&line))
    }

    fn capture(&self, command: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        let line = self.record(command)?;
        let stdout = self
            .stdout
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();
        Ok(ProcessOutput {
            status: self.status_for(&line),
            stdout,
        })
    }

    fn tool_exists(&self, program: &str) -> bool {
        self.tools.contains(program)
    }

    fn pause(&self, duration: Duration) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("pause {}s", duration.as_secs()));
        }
    }
}
