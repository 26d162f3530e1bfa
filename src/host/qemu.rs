//! QEMU binfmt preflight
//!
//! Foreign-architecture images only build if qemu-user is installed and its
//! binfmt handlers are registered with the kernel.

use crate::config::QemuConfig;

use super::process::{CommandSpec, ProcessError, ProcessRunner, ProcessStatus};

const INSTALL_HINT: &str = "apt: qemu qemu-user-static | pacman: qemu-headless qemu-headless-arch-extra | brew: qemu";

/// Preflight errors
#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("QEMU not installed ({binary} not found on PATH), install the missing package ({hint})")]
    QemuMissing { binary: String, hint: &'static str },

    #[error("listing docker images failed with {status}")]
    ImageQuery { status: ProcessStatus },

    #[error("registering binfmt handlers with {image} failed with {status}")]
    Registration { image: String, status: ProcessStatus },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// What the preflight did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QemuState {
    /// Disabled in config
    Skipped,
    /// Handler image already present locally
    AlreadyRegistered,
    /// Handlers registered by this run
    Registered,
}

pub struct QemuPreflight<'r> {
    runner: &'r dyn ProcessRunner,
    docker: String,
    config: QemuConfig,
}

impl<'r> QemuPreflight<'r> {
    pub fn new(runner: &'r dyn ProcessRunner, docker: impl Into<String>, config: QemuConfig) -> Self {
        Self {
            runner,
            docker: docker.into(),
            config,
        }
    }

    pub fn ensure(&self) -> Result<QemuState, PreflightError> {
        if !self.config.enabled {
            return Ok(QemuState::Skipped);
        }

        if !self.runner.tool_exists(&self.config.probe_binary) {
            return Err(PreflightError::QemuMissing {
                binary: self.config.probe_binary.clone(),
                hint: INSTALL_HINT,
            });
        }

        let images = self.runner.capture(
            &CommandSpec::new(&self.docker).args(["images", "--format", "{{ .Repository }}"]),
        )?;
        if !images.status.success() {
            return Err(PreflightError::ImageQuery {
                status: images.status,
            });
        }
        if images
            .stdout
            .lines()
            .any(|repo| repo.trim() == self.config.image)
        {
            tracing::debug!(image = %self.config.image, "binfmt handlers already registered");
            return Ok(QemuState::AlreadyRegistered);
        }

        tracing::info!(image = %self.config.image, "registering qemu binfmt handlers");
        let register = CommandSpec::new(&self.docker)
            .args(["run", "--rm", "--privileged"])
            .arg(&self.config.image)
            .args(["--reset", "-p", "yes"]);
        let status = self.runner.run(&register)?;
        if !status.success() {
            return Err(PreflightError::Registration {
                image: self.config.image.clone(),
                status,
            });
        }
        Ok(QemuState::Registered)
    }
}
