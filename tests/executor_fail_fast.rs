//! Fail-fast execution against the in-memory backend

use std::path::Path;

use distcc_cross::mock::FakeBackend;
use distcc_cross::summary::Status;
use distcc_cross::{
    BuildMatrixPlanner, ExitCode, FailureKind, JobExecutor, MatrixRequest, Outcome, PlannerConfig,
};

fn five_job_matrix() -> distcc_cross::BuildMatrix {
    BuildMatrixPlanner::new(PlannerConfig {
        project_dir: Path::new("/work").to_path_buf(),
        repository_prefix: "elijahru".to_string(),
    })
    .plan(&MatrixRequest {
        distro: "debian:buster".to_string(),
        host_arch: "amd64".to_string(),
        client_archs: vec!["arm64v8".to_string(), "s390x".to_string()],
        tag: "devel".to_string(),
    })
    .unwrap()
}

#[test]
fn test_failure_at_job_two_of_five() {
    let matrix = five_job_matrix();
    let mut executor = JobExecutor::new(FakeBackend::new().failing_at(2));

    let report = executor.run(&matrix);

    assert!(matches!(
        report.outcome,
        Outcome::Failed { job_index: 2, .. }
    ));
    assert_eq!(
        executor.backend().attempts().to_vec(),
        vec!["build host amd64", "build client arm64v8"]
    );

    let summary = report.summary();
    assert_eq!(summary.exit_code_enum(), Some(ExitCode::BuildFailure));
    assert_eq!(summary.failure_kind, Some(FailureKind::Build));
    assert_eq!(summary.failed_job, Some(2));
    assert_eq!(
        summary.jobs.iter().filter(|j| j.status == Status::Skipped).count(),
        3
    );
}

#[test]
fn test_failure_in_last_test_job() {
    let matrix = five_job_matrix();
    let mut executor = JobExecutor::new(FakeBackend::new().failing_at(5));

    let report = executor.run(&matrix);

    assert_eq!(report.outcome.exit_code(), ExitCode::VerificationFailure);
    assert_eq!(executor.into_backend().attempts().len(), 5);
    assert_eq!(report.summary().jobs_succeeded, 4);
}

#[test]
fn test_no_failure() {
    let matrix = five_job_matrix();
    let report = JobExecutor::new(FakeBackend::new()).run(&matrix);

    assert!(report.outcome.is_success());
    assert_eq!(report.summary().human_summary, "Run succeeded: 5/5 jobs passed");
}
