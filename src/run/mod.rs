//! Job execution
//!
//! Runs a [`BuildMatrix`] in its fixed order, one job at a time. The first
//! failure stops the run: later jobs are recorded as skipped and never
//! dispatched, and images already built stay in place.

use std::time::{Duration, Instant};

use crate::config::LaneConfig;
use crate::host::{
    BuildError, ImageBuilder, PreflightError, ProcessRunner, QemuPreflight, QemuState,
    TestError, TestLauncher,
};
use crate::job::{ImageSpec, Job, TestSpec};
use crate::matrix::BuildMatrix;
use crate::summary::{ExitCode, FailureKind, JobRecord, RunSummary};

/// Why a job failed
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Test(#[from] TestError),
}

impl JobError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            JobError::Preflight(PreflightError::Process(_))
            | JobError::Build(BuildError::Process(_))
            | JobError::Test(TestError::Process(_)) => FailureKind::Process,
            JobError::Preflight(_) => FailureKind::Preflight,
            JobError::Build(_) => FailureKind::Build,
            JobError::Test(_) => FailureKind::Verification,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.failure_kind().exit_code()
    }
}

/// Capability that carries out individual jobs
pub trait JobBackend {
    fn build_image(&mut self, spec: &ImageSpec) -> Result<(), JobError>;

    fn run_test(&mut self, spec: &TestSpec) -> Result<(), JobError>;
}

/// Docker-backed jobs
///
/// The QEMU preflight runs before the first build of a run and is not
/// repeated.
pub struct DockerBackend<'r> {
    runner: &'r dyn ProcessRunner,
    config: LaneConfig,
    qemu: Option<QemuState>,
}

impl<'r> DockerBackend<'r> {
    pub fn new(runner: &'r dyn ProcessRunner, config: LaneConfig) -> Self {
        Self {
            runner,
            config,
            qemu: None,
        }
    }

    /// Preflight result, once a build has run
    pub fn qemu_state(&self) -> Option<QemuState> {
        self.qemu
    }
}

impl JobBackend for DockerBackend<'_> {
    fn build_image(&mut self, spec: &ImageSpec) -> Result<(), JobError> {
        if self.qemu.is_none() {
            let preflight =
                QemuPreflight::new(self.runner, &self.config.docker, self.config.qemu.clone());
            self.qemu = Some(preflight.ensure()?);
        }
        ImageBuilder::new(self.runner, &self.config.docker).build(spec)?;
        Ok(())
    }

    fn run_test(&mut self, spec: &TestSpec) -> Result<(), JobError> {
        TestLauncher::new(
            self.runner,
            self.config.compose.clone(),
            Duration::from_secs(self.config.settle_seconds),
        )
        .run(spec)?;
        Ok(())
    }
}

/// Result of running a matrix
#[derive(Debug)]
pub enum Outcome {
    Succeeded,
    Failed {
        /// 1-based position of the failed job in the matrix
        job_index: usize,
        cause: JobError,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Outcome::Succeeded => ExitCode::Success,
            Outcome::Failed { cause, .. } => cause.exit_code(),
        }
    }
}

/// Everything a run produced
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub records: Vec<JobRecord>,
    pub outcome: Outcome,
    pub duration: Duration,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_records(
            self.run_id.clone(),
            self.records.clone(),
            self.duration.as_millis() as u64,
        )
    }
}

/// Sequential, fail-fast executor
pub struct JobExecutor<B> {
    backend: B,
}

impl<B: JobBackend> JobExecutor<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn run(&mut self, matrix: &BuildMatrix) -> RunReport {
        let started = Instant::now();
        let total = matrix.len();
        let mut records = Vec::with_capacity(total);
        let mut failure: Option<(usize, JobError)> = None;

        for (position, job) in matrix.jobs.iter().enumerate() {
            let job_index = position + 1;
            if failure.is_some() {
                records.push(JobRecord::skipped(job_index, job));
                continue;
            }

            let span = tracing::info_span!("job", run_id = %matrix.run_id, job_index);
            let _enter = span.enter();
            tracing::info!(kind = job.kind(), "starting job {}/{}: {}", job_index, total, job);

            let job_started = Instant::now();
            let result = match job {
                Job::Build(spec) => self.backend.build_image(spec),
                Job::Test(spec) => self.backend.run_test(spec),
            };
            let duration_ms = job_started.elapsed().as_millis() as u64;

            match result {
                Ok(()) => {
                    tracing::info!(duration_ms, "job succeeded");
                    records.push(JobRecord::success(job_index, job, duration_ms));
                }
                Err(cause) => {
                    tracing::error!(duration_ms, error = %cause, "job failed");
                    records.push(JobRecord::failure(
                        job_index,
                        job,
                        duration_ms,
                        cause.failure_kind(),
                        cause.to_string(),
                    ));
                    failure = Some((job_index, cause));
                }
            }
        }

        let outcome = match failure {
            None => Outcome::Succeeded,
            Some((job_index, cause)) => {
                tracing::warn!(
                    run_id = %matrix.run_id,
                    skipped = total - job_index,
                    "run stopped at job {}/{}",
                    job_index,
                    total
                );
                Outcome::Failed { job_index, cause }
            }
        };

        RunReport {
            run_id: matrix.run_id.clone(),
            records,
            outcome,
            duration: started.elapsed(),
        }
    }
}
