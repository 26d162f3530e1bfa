//! Pipeline orchestration
//!
//! Loads the layered config, plans a matrix, runs it through the docker
//! backend and, when an artifacts directory is given, writes
//! `<artifacts_dir>/<run_id>/{matrix,effective_config,run_summary}.json`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::config::{ConfigError, EffectiveConfig, LaneConfig};
use crate::host::ProcessRunner;
use crate::matrix::{BuildMatrix, BuildMatrixPlanner, PlanError, PlannerConfig};
use crate::run::{DockerBackend, JobExecutor, RunReport};
use crate::summary::{ExitCode, RunSummary};

/// Top-level errors
#[derive(Debug, Error)]
pub enum LaneError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("cannot write {}: {source}", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LaneError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            LaneError::Config(_) => ExitCode::InvalidInput,
            LaneError::Plan(PlanError::UnknownArchitecture(_)) => ExitCode::UnknownArchitecture,
            LaneError::Plan(_) => ExitCode::InvalidInput,
            LaneError::Artifact { .. } | LaneError::Serialization(_) => ExitCode::Process,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, LaneError>;

/// Where configuration comes from
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Host/user config (layer 2)
    pub host_config_path: Option<PathBuf>,

    /// Project config (layer 3)
    pub project_config_path: Option<PathBuf>,

    /// CLI overrides (layer 4)
    pub cli_overrides: Option<Value>,

    /// Write run artifacts under `<artifacts_dir>/<run_id>/`
    pub artifacts_dir: Option<PathBuf>,
}

/// What an executed run left behind
#[derive(Debug)]
pub struct PipelineRun {
    pub report: RunReport,
    pub summary: RunSummary,

    /// `<artifacts_dir>/<run_id>`, when artifacts were written
    pub artifact_dir: Option<PathBuf>,
}

pub struct Pipeline<'r> {
    effective: EffectiveConfig,
    lane: LaneConfig,
    runner: &'r dyn ProcessRunner,
    artifacts_dir: Option<PathBuf>,
}

impl<'r> Pipeline<'r> {
    /// Merge the config layers and validate the result
    pub fn load(config: PipelineConfig, runner: &'r dyn ProcessRunner) -> PipelineResult<Self> {
        let effective = EffectiveConfig::build(
            config.host_config_path.as_deref(),
            config.project_config_path.as_deref(),
            config.cli_overrides,
        )?;
        let lane = effective.lane()?;
        tracing::debug!(
            sources = effective.sources.len(),
            project_dir = %lane.project_dir.display(),
            tag = %lane.tag,
            "configuration loaded"
        );
        Ok(Self {
            effective,
            lane,
            runner,
            artifacts_dir: config.artifacts_dir,
        })
    }

    pub fn lane(&self) -> &LaneConfig {
        &self.lane
    }

    pub fn effective_config(&self) -> &EffectiveConfig {
        &self.effective
    }

    pub fn planner(&self) -> BuildMatrixPlanner {
        BuildMatrixPlanner::new(PlannerConfig {
            project_dir: self.lane.project_dir.clone(),
            repository_prefix: self.lane.repository_prefix.clone(),
        })
    }

    /// Run every job of `matrix` and record the outcome
    ///
    /// A failed job is not an error here: it is reported in the returned
    /// summary and its exit code.
    pub fn execute(&self, matrix: &BuildMatrix) -> PipelineResult<PipelineRun> {
        let artifact_dir = match &self.artifacts_dir {
            Some(dir) => Some(self.prepare_artifacts(dir, matrix)?),
            None => None,
        };

        tracing::info!(
            run_id = %matrix.run_id,
            jobs = matrix.len(),
            "starting run"
        );
        let backend = DockerBackend::new(self.runner, self.lane.clone());
        let report = JobExecutor::new(backend).run(matrix);
        let summary = report.summary();

        if let Some(dir) = &artifact_dir {
            let path = dir.join("run_summary.json");
            summary
                .write_to_file(&path)
                .map_err(|source| LaneError::Artifact { path, source })?;
        }

        tracing::info!(
            run_id = %summary.run_id,
            exit_code = summary.exit_code,
            duration_ms = summary.duration_ms,
            "{}",
            summary.human_summary
        );
        Ok(PipelineRun {
            report,
            summary,
            artifact_dir,
        })
    }

    fn prepare_artifacts(&self, root: &Path, matrix: &BuildMatrix) -> PipelineResult<PathBuf> {
        let dir = root.join(&matrix.run_id);
        fs::create_dir_all(&dir).map_err(|source| LaneError::Artifact {
            path: dir.clone(),
            source,
        })?;

        let path = dir.join("matrix.json");
        matrix
            .write_to_file(&path)
            .map_err(|source| LaneError::Artifact { path, source })?;

        let path = dir.join("effective_config.json");
        self.effective
            .clone()
            .with_run_id(matrix.run_id.clone())
            .write_to_file(&path)
            .map_err(|source| LaneError::Artifact { path, source })?;

        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;
    use crate::matrix::MatrixRequest;
    use crate::mock::RecordingRunner;
    use distcc_cross_arch::ArchError;
    use tempfile::TempDir;

    fn overrides(project_dir: &Path) -> Value {
        serde_json::json!({
            "project_dir": project_dir.to_string_lossy(),
            "settle_seconds": 0,
            "qemu": {"enabled": false}
        })
    }

    fn render(matrix: &BuildMatrix) {
        for job in &matrix.jobs {
            let path = match job {
                Job::Build(spec) => &spec.dockerfile,
                Job::Test(spec) => &spec.compose_file,
            };
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
    }

    #[test]
    fn test_exit_codes() {
        let unknown = LaneError::Plan(PlanError::UnknownArchitecture(
            ArchError::UnknownArchitecture {
                id: "mips".to_string(),
                supported: vec![],
            },
        ));
        assert_eq!(unknown.exit_code(), ExitCode::UnknownArchitecture);
        assert_eq!(
            LaneError::Plan(PlanError::InvalidInput("x".to_string())).exit_code(),
            ExitCode::InvalidInput
        );
        assert_eq!(
            LaneError::Config(ConfigError::Invalid("x".to_string())).exit_code(),
            ExitCode::InvalidInput
        );
    }

    #[test]
    fn test_load_applies_cli_overrides() {
        let runner = RecordingRunner::new();
        let pipeline = Pipeline::load(
            PipelineConfig {
                cli_overrides: Some(serde_json::json!({"tag": "nightly"})),
                ..PipelineConfig::default()
            },
            &runner,
        )
        .unwrap();
        assert_eq!(pipeline.lane().tag, "nightly");
        assert_eq!(pipeline.planner().config().repository_prefix, "elijahru");
    }

    #[test]
    fn test_invalid_config_is_error() {
        let runner = RecordingRunner::new();
        let result = Pipeline::load(
            PipelineConfig {
                cli_overrides: Some(serde_json::json!({"repository_prefix": ""})),
                ..PipelineConfig::default()
            },
            &runner,
        );
        assert!(matches!(result, Err(LaneError::Config(_))));
    }

    #[test]
    fn test_execute_writes_artifacts() {
        let project = TempDir::new().unwrap();
        let artifacts = TempDir::new().unwrap();
        let runner = RecordingRunner::new();
        let pipeline = Pipeline::load(
            PipelineConfig {
                cli_overrides: Some(overrides(project.path())),
                artifacts_dir: Some(artifacts.path().to_path_buf()),
                ..PipelineConfig::default()
            },
            &runner,
        )
        .unwrap();
        let matrix = pipeline
            .planner()
            .plan(&MatrixRequest {
                distro: "debian:buster".to_string(),
                host_arch: "amd64".to_string(),
                client_archs: vec!["s390x".to_string()],
                tag: pipeline.lane().tag.clone(),
            })
            .unwrap();
        render(&matrix);

        let run = pipeline.execute(&matrix).unwrap();

        assert!(run.report.outcome.is_success());
        let dir = run.artifact_dir.unwrap();
        assert_eq!(dir, artifacts.path().join(&matrix.run_id));
        assert!(dir.join("matrix.json").is_file());
        assert!(dir.join("effective_config.json").is_file());
        let summary = RunSummary::from_file(&dir.join("run_summary.json")).unwrap();
        assert_eq!(summary.run_id, matrix.run_id);
        assert_eq!(summary.job_count, 3);
    }

    #[test]
    fn test_execute_reports_job_failure_in_summary() {
        let project = TempDir::new().unwrap();
        let runner = RecordingRunner::new().with_exit_code("docker build", 1);
        let pipeline = Pipeline::load(
            PipelineConfig {
                cli_overrides: Some(overrides(project.path())),
                ..PipelineConfig::default()
            },
            &runner,
        )
        .unwrap();
        let matrix = pipeline
            .planner()
            .plan_all("devel");
        render(&matrix);

        let run = pipeline.execute(&matrix).unwrap();

        assert_eq!(run.summary.exit_code, ExitCode::BuildFailure.as_i32());
        assert_eq!(run.summary.failed_job, Some(1));
        assert_eq!(runner.count_matching("docker build"), 1);
        assert!(run.artifact_dir.is_none());
    }
}
