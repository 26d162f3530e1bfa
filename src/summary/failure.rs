//! Failure taxonomy and stable exit codes

use serde::{Deserialize, Serialize};

/// Job/run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failed,
    /// Never attempted because an earlier job failed
    Skipped,
}

impl Status {
    pub fn is_failure(&self) -> bool {
        matches!(self, Status::Failed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Success => write!(f, "success"),
            Status::Failed => write!(f, "failed"),
            Status::Skipped => write!(f, "skipped"),
        }
    }
}

/// Failure kind - categorizes the cause of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Missing or malformed arguments or config
    InvalidInput,
    /// Architecture id not in the catalog
    UnknownArchitecture,
    /// Host not ready for foreign-architecture builds
    Preflight,
    /// docker build failed
    Build,
    /// A check inside the client container failed
    Verification,
    /// A program could not be run or an artifact could not be written
    Process,
}

impl FailureKind {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            FailureKind::InvalidInput => ExitCode::InvalidInput,
            FailureKind::UnknownArchitecture => ExitCode::UnknownArchitecture,
            FailureKind::Preflight => ExitCode::Preflight,
            FailureKind::Build => ExitCode::BuildFailure,
            FailureKind::Verification => ExitCode::VerificationFailure,
            FailureKind::Process => ExitCode::Process,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FailureKind::InvalidInput => "Invalid input",
            FailureKind::UnknownArchitecture => "Unknown architecture",
            FailureKind::Preflight => "Preflight check failed",
            FailureKind::Build => "Image build failed",
            FailureKind::Verification => "Verification failed",
            FailureKind::Process => "Process error",
        }
    }
}

/// Stable process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum ExitCode {
    #[default]
    Success = 0,
    /// Usage, argument or config error
    InvalidInput = 1,
    UnknownArchitecture = 2,
    Preflight = 10,
    BuildFailure = 20,
    VerificationFailure = 30,
    /// Spawn or I/O failure
    Process = 40,
}

impl ExitCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(ExitCode::Success),
            1 => Some(ExitCode::InvalidInput),
            2 => Some(ExitCode::UnknownArchitecture),
            10 => Some(ExitCode::Preflight),
            20 => Some(ExitCode::BuildFailure),
            30 => Some(ExitCode::VerificationFailure),
            40 => Some(ExitCode::Process),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

/// Aggregates per-job results into a run status and exit code
///
/// The first failure decides the exit code.
#[derive(Debug, Default)]
pub struct ExitCodeAggregator {
    first_failure_code: Option<ExitCode>,
}

impl ExitCodeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, status: Status, exit_code: ExitCode) {
        if status.is_failure() && self.first_failure_code.is_none() {
            self.first_failure_code = Some(exit_code);
        }
    }

    pub fn status(&self) -> Status {
        if self.first_failure_code.is_some() {
            Status::Failed
        } else {
            Status::Success
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.first_failure_code.unwrap_or(ExitCode::Success)
    }
}
