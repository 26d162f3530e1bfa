//! In-memory job backend

use crate::host::{BuildError, ProcessStatus, TestError};
use crate::job::{ImageSpec, TestSpec};
use crate::run::{JobBackend, JobError};

/// Records attempted jobs and fails on request
///
/// Build failures surface as `BuildError::Failed`, test failures as
/// `TestError::VerificationFailed`, both with exit code 1.
#[derive(Debug, Default)]
pub struct FakeBackend {
    fail_at: Option<usize>,
    attempts: Vec<String>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the job at this 1-based position
    pub fn failing_at(mut self, job_index: usize) -> Self {
        self.fail_at = Some(job_index);
        self
    }

    /// Descriptions of every job dispatched, in order
    pub fn attempts(&self) -> &[String] {
        &self.attempts
    }

    fn attempt(&mut self, description: String) -> bool {
        self.attempts.push(description);
        self.fail_at == Some(self.attempts.len())
    }
}

impl JobBackend for FakeBackend {
    fn build_image(&mut self, spec: &ImageSpec) -> Result<(), JobError> {
        if self.attempt(format!("build {} {}", spec.role, spec.arch)) {
            return Err(BuildError::Failed {
                tag: spec.tag.clone(),
                status: ProcessStatus::exited(1),
            }
            .into());
        }
        Ok(())
    }

    fn run_test(&mut self, spec: &TestSpec) -> Result<(), JobError> {
        if self.attempt(format!("test {} {}", spec.host_arch, spec.client_arch)) {
            return Err(TestError::VerificationFailed {
                host_arch: spec.host_arch.clone(),
                client_arch: spec.client_arch.clone(),
                status: ProcessStatus::exited(1),
            }
            .into());
        }
        Ok(())
    }
}
