//! Verification checks run inside a client container
//!
//! Checks run in a fixed order and stop at the first failure:
//! 1. `uname -m` matches the catalog entry for the expected architecture
//! 2. `gcc`, `g++` and `cc` resolve to ccache wrappers
//! 3. the last line of bare `gcc` output comes from distcc (`distcc[<pid>]`)
//! 4. a reference C project builds its `test` target twice with a clean between

use std::io;
use std::path::{Path, PathBuf};

use distcc_cross_arch::{ArchCatalog, ArchError};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::environment::Environment;
use crate::scratch;

/// Default ccache wrapper directories (Debian-like, ArchLinux-like)
pub const DEFAULT_WRAPPER_DIRS: &[&str] = &["/usr/lib/ccache", "/usr/lib/ccache/bin"];

/// Compiler front-ends that must be intercepted by ccache
pub const DEFAULT_COMPILERS: &[&str] = &["gcc", "g++", "cc"];

/// Pattern for the last line of bare compiler output when distcc is chained under ccache
pub const DEFAULT_DISTCC_PATTERN: &str = r"^distcc\[[0-9]+\]";

pub const DEFAULT_SCRATCH_DIR: &str = "/tmp/distcc-cross-verify";

/// One of the verification checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Architecture,
    Wrapper,
    Compile,
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Check::Architecture => write!(f, "architecture"),
            Check::Wrapper => write!(f, "wrapper"),
            Check::Compile => write!(f, "compile"),
        }
    }
}

/// Outcome of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Failed,
    /// Disabled by configuration
    Skipped,
    /// Not reached because an earlier check failed
    NotRun,
}

/// Per-check outcome of one verification run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub expected_arch: String,
    pub architecture: CheckStatus,
    pub wrapper: CheckStatus,
    pub compile: CheckStatus,
}

impl VerificationResult {
    fn new(expected_arch: &str) -> Self {
        Self {
            expected_arch: expected_arch.to_string(),
            architecture: CheckStatus::NotRun,
            wrapper: CheckStatus::NotRun,
            compile: CheckStatus::NotRun,
        }
    }

    fn set(&mut self, check: Check, status: CheckStatus) {
        match check {
            Check::Architecture => self.architecture = status,
            Check::Wrapper => self.wrapper = status,
            Check::Compile => self.compile = status,
        }
    }

    /// True when no check failed or was left unrun
    pub fn passed(&self) -> bool {
        [self.architecture, self.wrapper, self.compile]
            .iter()
            .all(|s| matches!(s, CheckStatus::Passed | CheckStatus::Skipped))
    }
}

/// Verification errors
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Arch(#[from] ArchError),

    #[error("machine mismatch for {arch}: expected '{expected}', observed '{observed}'")]
    ArchitectureMismatch {
        arch: String,
        expected: String,
        observed: String,
    },

    #[error("compiler '{compiler}' not found on PATH")]
    CompilerNotFound { compiler: String },

    #[error("compiler '{compiler}' resolves to {}, expected a ccache wrapper under {}", .resolved.display(), .expected.join(" or "))]
    NotIntercepted {
        compiler: String,
        resolved: PathBuf,
        expected: Vec<String>,
    },

    #[error("distcc is not chained under '{compiler}': last output line '{observed}' does not match {pattern}")]
    DistccNotChained {
        compiler: String,
        pattern: String,
        observed: String,
    },

    #[error("invalid distcc pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("compile pass {pass}: `{command}` failed with {status}")]
    CompileFailed {
        pass: u8,
        command: String,
        status: crate::environment::CommandStatus,
    },

    #[error("no reference project archive configured (pass --archive or --skip-compile)")]
    MissingArchive,

    #[error("failed to unpack {}: {reason}", .archive.display())]
    Unpack { archive: PathBuf, reason: String },

    #[error("failed to run {program}: {source}")]
    Command {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("scratch directory {}: {source}", .path.display())]
    Scratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl VerifyError {
    /// The check this error belongs to
    pub fn check(&self) -> Check {
        match self {
            VerifyError::Arch(_) | VerifyError::ArchitectureMismatch { .. } => Check::Architecture,
            VerifyError::CompilerNotFound { .. }
            | VerifyError::NotIntercepted { .. }
            | VerifyError::DistccNotChained { .. }
            | VerifyError::Pattern { .. } => Check::Wrapper,
            VerifyError::CompileFailed { .. }
            | VerifyError::MissingArchive
            | VerifyError::Unpack { .. }
            | VerifyError::Command { .. }
            | VerifyError::Scratch { .. } => Check::Compile,
        }
    }
}

/// A failed verification together with the partial per-check result
#[derive(Debug, thiserror::Error)]
#[error("{} check failed: {error}", .error.check())]
pub struct VerificationFailure {
    pub result: VerificationResult,
    #[source]
    pub error: VerifyError,
}

/// Verifier options
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Reference C project archive (`.tar` or `.tar.zst`)
    pub archive: Option<PathBuf>,
    /// Report the compile check as skipped instead of requiring an archive
    pub skip_compile: bool,
    pub scratch_dir: PathBuf,
    pub compilers: Vec<String>,
    pub wrapper_dirs: Vec<PathBuf>,
    /// Compiler invoked without arguments to probe the distcc layer
    pub probe_compiler: String,
    pub distcc_pattern: String,
    pub make: String,
    pub test_target: String,
    pub clean_target: String,
    /// Compiler-cache inspection command, logged after each compile pass
    pub cache_stats: Option<Vec<String>>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            archive: None,
            skip_compile: false,
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
            compilers: DEFAULT_COMPILERS.iter().map(|c| c.to_string()).collect(),
            wrapper_dirs: DEFAULT_WRAPPER_DIRS.iter().map(PathBuf::from).collect(),
            probe_compiler: "gcc".to_string(),
            distcc_pattern: DEFAULT_DISTCC_PATTERN.to_string(),
            make: "make".to_string(),
            test_target: "test".to_string(),
            clean_target: "clean".to_string(),
            cache_stats: Some(vec!["ccache".to_string(), "--show-stats".to_string()]),
        }
    }
}

/// Runs the verification checks against an [`Environment`]
pub struct VerificationRunner<E: Environment> {
    env: E,
    catalog: ArchCatalog,
    options: VerifyOptions,
}

impl<E: Environment> VerificationRunner<E> {
    pub fn new(env: E, catalog: ArchCatalog, options: VerifyOptions) -> Self {
        Self {
            env,
            catalog,
            options,
        }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    /// Run all checks, stopping at the first failure
    pub fn verify(&self, expected_arch: &str) -> Result<VerificationResult, VerificationFailure> {
        let mut result = VerificationResult::new(expected_arch);

        record(&mut result, Check::Architecture, self.check_architecture(expected_arch))?;
        record(&mut result, Check::Wrapper, self.check_wrappers())?;
        record(&mut result, Check::Compile, self.check_compile())?;

        Ok(result)
    }

    /// Check 1: reported machine identifier matches the catalog
    pub fn check_architecture(&self, expected_arch: &str) -> Result<CheckStatus, VerifyError> {
        let arch = self.catalog.lookup(expected_arch)?;
        let observed = self.env.machine().map_err(|source| VerifyError::Command {
            program: "uname".to_string(),
            source,
        })?;

        if observed != arch.machine {
            return Err(VerifyError::ArchitectureMismatch {
                arch: arch.id.to_string(),
                expected: arch.machine.to_string(),
                observed,
            });
        }
        Ok(CheckStatus::Passed)
    }

    /// Checks 2 and 3: ccache intercepts the compilers and distcc sits beneath it
    pub fn check_wrappers(&self) -> Result<CheckStatus, VerifyError> {
        for compiler in &self.options.compilers {
            let resolved = self
                .env
                .resolve(compiler)
                .ok_or_else(|| VerifyError::CompilerNotFound {
                    compiler: compiler.clone(),
                })?;
            debug!(compiler = %compiler, resolved = %resolved.display(), "resolved compiler");

            let intercepted = resolved
                .parent()
                .map(|parent| self.options.wrapper_dirs.iter().any(|dir| parent == dir))
                .unwrap_or(false);
            if !intercepted {
                return Err(VerifyError::NotIntercepted {
                    compiler: compiler.clone(),
                    resolved,
                    expected: self
                        .options
                        .wrapper_dirs
                        .iter()
                        .map(|d| d.display().to_string())
                        .collect(),
                });
            }
        }

        let pattern = Regex::new(&self.options.distcc_pattern).map_err(|e| VerifyError::Pattern {
            pattern: self.options.distcc_pattern.clone(),
            reason: e.to_string(),
        })?;
        let compiler = &self.options.probe_compiler;
        let output = self
            .env
            .capture(compiler, &[])
            .map_err(|source| VerifyError::Command {
                program: compiler.clone(),
                source,
            })?;
        let last_line = output.last_line().unwrap_or_default();
        if !pattern.is_match(&last_line) {
            return Err(VerifyError::DistccNotChained {
                compiler: compiler.clone(),
                pattern: self.options.distcc_pattern.clone(),
                observed: last_line,
            });
        }

        Ok(CheckStatus::Passed)
    }

    /// Check 4: build the reference project twice, the second time against a warm cache
    pub fn check_compile(&self) -> Result<CheckStatus, VerifyError> {
        if self.options.skip_compile {
            return Ok(CheckStatus::Skipped);
        }
        let Some(archive) = &self.options.archive else {
            return Err(VerifyError::MissingArchive);
        };
        let scratch_dir = &self.options.scratch_dir;

        scratch::reset(scratch_dir).map_err(|source| VerifyError::Scratch {
            path: scratch_dir.clone(),
            source,
        })?;
        self.unpack(archive, scratch_dir)?;
        let project = scratch::project_root(scratch_dir).map_err(|source| VerifyError::Scratch {
            path: scratch_dir.clone(),
            source,
        })?;
        info!(project = %project.display(), "unpacked reference project");

        self.make(1, &self.options.test_target, &project)?;
        self.log_cache_stats();
        self.make(1, &self.options.clean_target, &project)?;
        self.make(2, &self.options.test_target, &project)?;
        self.log_cache_stats();

        Ok(CheckStatus::Passed)
    }

    fn unpack(&self, archive: &Path, dest: &Path) -> Result<(), VerifyError> {
        scratch::unpack(archive, dest).map_err(|e| VerifyError::Unpack {
            archive: archive.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn make(&self, pass: u8, target: &str, project: &Path) -> Result<(), VerifyError> {
        info!(pass, target, "running make");
        let status = self
            .env
            .run(&self.options.make, &[target], project)
            .map_err(|source| VerifyError::Command {
                program: self.options.make.clone(),
                source,
            })?;
        if !status.success() {
            return Err(VerifyError::CompileFailed {
                pass,
                command: format!("{} {}", self.options.make, target),
                status,
            });
        }
        Ok(())
    }

    fn log_cache_stats(&self) {
        let Some((program, args)) = self.options.cache_stats.as_ref().and_then(|c| c.split_first())
        else {
            return;
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match self.env.capture(program, &args) {
            Ok(output) if output.status.success() => {
                info!(stats = %output.stdout.trim(), "compiler cache statistics");
            }
            Ok(output) => debug!(status = %output.status, "cache statistics unavailable"),
            Err(e) => debug!(error = %e, "cache statistics unavailable"),
        }
    }
}

fn record(
    result: &mut VerificationResult,
    check: Check,
    outcome: Result<CheckStatus, VerifyError>,
) -> Result<(), VerificationFailure> {
    match outcome {
        Ok(status) => {
            info!(%check, ?status, "check finished");
            result.set(check, status);
            Ok(())
        }
        Err(error) => {
            warn!(%check, %error, "check failed");
            result.set(check, CheckStatus::Failed);
            Err(VerificationFailure {
                result: result.clone(),
                error,
            })
        }
    }
}
