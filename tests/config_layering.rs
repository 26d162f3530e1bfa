//! Config layering and pipeline artifact tests

use std::fs;
use std::path::Path;

use distcc_cross::config::{ConfigOrigin, EffectiveConfig};
use distcc_cross::mock::RecordingRunner;
use distcc_cross::{Job, LaneError, MatrixRequest, Pipeline, PipelineConfig, RunSummary};
use serde_json::json;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_later_layers_win() {
    let dir = TempDir::new().unwrap();
    let host = write(
        dir.path(),
        "host.toml",
        "repository_prefix = \"registry.local\"\ntag = \"stable\"\n",
    );
    let project = write(
        dir.path(),
        "project.toml",
        "tag = \"devel-2\"\n[compose]\ncommand = [\"docker\", \"compose\"]\n",
    );

    let config =
        EffectiveConfig::build(Some(&host), Some(&project), Some(json!({"settle_seconds": 1})))
            .unwrap();
    let lane = config.lane().unwrap();

    assert_eq!(lane.repository_prefix, "registry.local");
    assert_eq!(lane.tag, "devel-2");
    assert_eq!(lane.compose.command, vec!["docker", "compose"]);
    assert_eq!(lane.compose.host_service, "distcc-cross-compiler-host");
    assert_eq!(lane.settle_seconds, 1);

    let origins: Vec<ConfigOrigin> = config.sources.iter().map(|s| s.origin).collect();
    assert_eq!(
        origins,
        vec![
            ConfigOrigin::Builtin,
            ConfigOrigin::Host,
            ConfigOrigin::Project,
            ConfigOrigin::Cli
        ]
    );
    assert!(config.sources[1].digest.is_some());
}

#[test]
fn test_malformed_project_config_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    let project = write(dir.path(), "distcc-cross.toml", "tag = \n");
    let runner = RecordingRunner::new();

    let err = Pipeline::load(
        PipelineConfig {
            project_config_path: Some(project),
            ..PipelineConfig::default()
        },
        &runner,
    )
    .err()
    .unwrap();

    assert!(matches!(err, LaneError::Config(_)));
    assert_eq!(err.exit_code().as_i32(), 1);
}

#[test]
fn test_pipeline_writes_run_artifacts() {
    let project = TempDir::new().unwrap();
    let artifacts = TempDir::new().unwrap();
    let runner = RecordingRunner::new();
    let pipeline = Pipeline::load(
        PipelineConfig {
            cli_overrides: Some(json!({
                "project_dir": project.path().to_string_lossy(),
                "settle_seconds": 0,
                "qemu": {"enabled": false}
            })),
            artifacts_dir: Some(artifacts.path().to_path_buf()),
            ..PipelineConfig::default()
        },
        &runner,
    )
    .unwrap();
    let matrix = pipeline
        .planner()
        .plan(&MatrixRequest {
            distro: "archlinux".to_string(),
            host_arch: "amd64".to_string(),
            client_archs: vec!["arm32v6".to_string()],
            tag: "devel".to_string(),
        })
        .unwrap();
    for job in &matrix.jobs {
        let path = match job {
            Job::Build(spec) => &spec.dockerfile,
            Job::Test(spec) => &spec.compose_file,
        };
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    let run = pipeline.execute(&matrix).unwrap();

    let dir = artifacts.path().join(&matrix.run_id);
    let summary = RunSummary::from_file(&dir.join("run_summary.json")).unwrap();
    assert_eq!(summary.exit_code, 0);
    assert_eq!(summary.jobs_succeeded, 3);
    assert_eq!(run.summary.run_id, summary.run_id);

    let effective = fs::read_to_string(dir.join("effective_config.json")).unwrap();
    assert!(effective.contains(&matrix.run_id));
    let planned = fs::read_to_string(dir.join("matrix.json")).unwrap();
    assert!(planned.contains(r#""kind": "test""#));
}
