//! Image builds and compose-driven tests

use std::path::PathBuf;
use std::time::Duration;

use crate::config::ComposeConfig;
use crate::job::{ImageSpec, TestSpec};

use super::process::{CommandSpec, ProcessError, ProcessRunner, ProcessStatus};

/// Image build errors
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("cannot build {tag}: Dockerfile {} does not exist (render it first)", .path.display())]
    MissingDockerfile { tag: String, path: PathBuf },

    #[error("docker build of {tag} failed with {status}")]
    Failed { tag: String, status: ProcessStatus },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Builds one image per [`ImageSpec`]
///
/// The previous image under the same tag is pulled first and used as the
/// layer cache; a failed pull only means there is nothing to reuse yet.
pub struct ImageBuilder<'r> {
    runner: &'r dyn ProcessRunner,
    docker: String,
}

impl<'r> ImageBuilder<'r> {
    pub fn new(runner: &'r dyn ProcessRunner, docker: impl Into<String>) -> Self {
        Self {
            runner,
            docker: docker.into(),
        }
    }

    pub fn build(&self, spec: &ImageSpec) -> Result<(), BuildError> {
        if !spec.dockerfile.is_file() {
            return Err(BuildError::MissingDockerfile {
                tag: spec.tag.clone(),
                path: spec.dockerfile.clone(),
            });
        }

        let pull = CommandSpec::new(&self.docker)
            .arg("pull")
            .arg(&spec.cache_from);
        let status = self.runner.run(&pull)?;
        if !status.success() {
            tracing::warn!(
                image = %spec.cache_from,
                %status,
                "no cached image to pull, building from scratch"
            );
        }

        let build = CommandSpec::new(&self.docker)
            .arg("build")
            .path_arg(&spec.context)
            .arg("--file")
            .path_arg(&spec.dockerfile)
            .arg("--tag")
            .arg(&spec.tag)
            .arg("--cache-from")
            .arg(&spec.cache_from);
        tracing::info!(tag = %spec.tag, arch = %spec.arch, role = %spec.role, "building image");
        let status = self.runner.run(&build)?;
        if !status.success() {
            return Err(BuildError::Failed {
                tag: spec.tag.clone(),
                status,
            });
        }
        Ok(())
    }
}

/// Test job errors
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    #[error("compose file {} does not exist (render it first)", .path.display())]
    MissingComposeFile { path: PathBuf },

    #[error("compose command is empty")]
    EmptyComposeCommand,

    #[error("host service {service} failed to start with {status}")]
    HostFailed { service: String, status: ProcessStatus },

    #[error("verification of client {client_arch} against host {host_arch} failed with {status}")]
    VerificationFailed {
        host_arch: String,
        client_arch: String,
        status: ProcessStatus,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Brings up the distccd host service, then runs the verifying client
pub struct TestLauncher<'r> {
    runner: &'r dyn ProcessRunner,
    compose: ComposeConfig,
    settle: Duration,
}

impl<'r> TestLauncher<'r> {
    pub fn new(runner: &'r dyn ProcessRunner, compose: ComposeConfig, settle: Duration) -> Self {
        Self {
            runner,
            compose,
            settle,
        }
    }

    fn compose(&self, spec: &TestSpec) -> Result<CommandSpec, TestError> {
        Ok(CommandSpec::from_prefix(&self.compose.command)
            .ok_or(TestError::EmptyComposeCommand)?
            .arg("-f")
            .path_arg(&spec.compose_file))
    }

    pub fn run(&self, spec: &TestSpec) -> Result<(), TestError> {
        if !spec.compose_file.is_file() {
            return Err(TestError::MissingComposeFile {
                path: spec.compose_file.clone(),
            });
        }

        let up = self
            .compose(spec)?
            .args(["up", "-d"])
            .arg(&self.compose.host_service);
        let status = self.runner.run(&up)?;
        if !status.success() {
            return Err(TestError::HostFailed {
                service: self.compose.host_service.clone(),
                status,
            });
        }

        // distccd needs a moment before it accepts connections
        self.runner.pause(self.settle);

        let client = self
            .compose(spec)?
            .args(["run", "--rm"])
            .arg(&self.compose.client_service);
        tracing::info!(
            host = %spec.host_arch,
            client = %spec.client_arch,
            distro = %spec.distro,
            "running client verification"
        );
        let status = self.runner.run(&client)?;
        if !status.success() {
            return Err(TestError::VerificationFailed {
                host_arch: spec.host_arch.clone(),
                client_arch: spec.client_arch.clone(),
                status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distro::Role;
    use crate::mock::RecordingRunner;
    use std::fs;
    use tempfile::TempDir;

    fn image_spec(dir: &TempDir) -> ImageSpec {
        let dockerfile = dir.path().join("Dockerfile.arm64v8");
        fs::write(&dockerfile, "FROM scratch\n").unwrap();
        ImageSpec {
            role: Role::Client,
            distro: "debian:buster".to_string(),
            arch: "arm64v8".to_string(),
            tag: "p/img:devel-arm64v8".to_string(),
            dockerfile,
            context: dir.path().join("build-context"),
            cache_from: "p/img:devel-arm64v8".to_string(),
        }
    }

    fn test_spec(dir: &TempDir) -> TestSpec {
        let compose_file = dir.path().join("compose.yml");
        fs::write(&compose_file, "services: {}\n").unwrap();
        TestSpec {
            distro: "debian:buster".to_string(),
            host_arch: "amd64".to_string(),
            client_distro: "debian:buster".to_string(),
            client_arch: "s390x".to_string(),
            compose_file,
        }
    }

    #[test]
    fn test_build_pulls_then_builds() {
        let dir = TempDir::new().unwrap();
        let spec = image_spec(&dir);
        let runner = RecordingRunner::new();

        ImageBuilder::new(&runner, "docker").build(&spec).unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], "docker pull p/img:devel-arm64v8");
        assert_eq!(
            calls[1],
            format!(
                "docker build {} --file {} --tag p/img:devel-arm64v8 --cache-from p/img:devel-arm64v8",
                spec.context.display(),
                spec.dockerfile.display()
            )
        );
    }

    #[test]
    fn test_failed_pull_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let runner = RecordingRunner::new().with_exit_code("docker pull", 1);

        ImageBuilder::new(&runner, "docker")
            .build(&image_spec(&dir))
            .unwrap();

        assert_eq!(runner.count_matching("docker build"), 1);
    }

    #[test]
    fn test_failed_build_is_error() {
        let dir = TempDir::new().unwrap();
        let runner = RecordingRunner::new().with_exit_code("docker build", 2);

        let err = ImageBuilder::new(&runner, "docker")
            .build(&image_spec(&dir))
            .unwrap_err();

        match err {
            BuildError::Failed { tag, status } => {
                assert_eq!(tag, "p/img:devel-arm64v8");
                assert_eq!(status.code, Some(2));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_dockerfile_runs_nothing() {
        let dir = TempDir::new().unwrap();
        let mut spec = image_spec(&dir);
        spec.dockerfile = dir.path().join("absent");
        let runner = RecordingRunner::new();

        let err = ImageBuilder::new(&runner, "docker").build(&spec).unwrap_err();

        assert!(matches!(err, BuildError::MissingDockerfile { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_custom_docker_program() {
        let dir = TempDir::new().unwrap();
        let runner = RecordingRunner::new();
        ImageBuilder::new(&runner, "podman")
            .build(&image_spec(&dir))
            .unwrap();
        assert_eq!(runner.count_matching("podman "), 2);
    }

    #[test]
    fn test_launcher_sequence() {
        let dir = TempDir::new().unwrap();
        let spec = test_spec(&dir);
        let runner = RecordingRunner::new();
        let launcher =
            TestLauncher::new(&runner, ComposeConfig::default(), Duration::from_secs(5));

        launcher.run(&spec).unwrap();

        let file = spec.compose_file.display();
        assert_eq!(
            runner.calls(),
            vec![
                format!("docker-compose -f {} up -d distcc-cross-compiler-host", file),
                "pause 5s".to_string(),
                format!("docker-compose -f {} run --rm distcc-cross-compiler-client", file),
            ]
        );
    }

    #[test]
    fn test_launcher_compose_prefix() {
        let dir = TempDir::new().unwrap();
        let runner = RecordingRunner::new();
        let compose = ComposeConfig {
            command: vec!["docker".to_string(), "compose".to_string()],
            ..ComposeConfig::default()
        };

        TestLauncher::new(&runner, compose, Duration::ZERO)
            .run(&test_spec(&dir))
            .unwrap();

        assert_eq!(runner.count_matching("docker compose -f"), 2);
    }

    #[test]
    fn test_client_failure_is_verification_failure() {
        let dir = TempDir::new().unwrap();
        let client_call = format!(
            "docker-compose -f {} run",
            dir.path().join("compose.yml").display()
        );
        let runner = RecordingRunner::new().with_exit_code(&client_call, 1);

        let err = TestLauncher::new(&runner, ComposeConfig::default(), Duration::ZERO)
            .run(&test_spec(&dir))
            .unwrap_err();

        match err {
            TestError::VerificationFailed { client_arch, host_arch, .. } => {
                assert_eq!(client_arch, "s390x");
                assert_eq!(host_arch, "amd64");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_host_failure_skips_client() {
        let dir = TempDir::new().unwrap();
        let runner = RecordingRunner::new().with_exit_code("docker-compose", 1);

        let err = TestLauncher::new(&runner, ComposeConfig::default(), Duration::ZERO)
            .run(&test_spec(&dir))
            .unwrap_err();

        assert!(matches!(err, TestError::HostFailed { .. }));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_missing_compose_file() {
        let dir = TempDir::new().unwrap();
        let mut spec = test_spec(&dir);
        spec.compose_file = dir.path().join("absent.yml");
        let runner = RecordingRunner::new();

        let err = TestLauncher::new(&runner, ComposeConfig::default(), Duration::ZERO)
            .run(&spec)
            .unwrap_err();

        assert!(matches!(err, TestError::MissingComposeFile { .. }));
        assert!(runner.calls().is_empty());
    }
}
