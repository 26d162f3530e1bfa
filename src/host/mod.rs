//! Host-side side effects
//!
//! Everything that shells out to docker lives here, behind the
//! [`ProcessRunner`] seam.

pub mod docker;
pub mod process;
pub mod qemu;

pub use docker::{BuildError, ImageBuilder, TestError, TestLauncher};
pub use process::{
    CommandSpec, ProcessError, ProcessOutput, ProcessRunner, ProcessStatus, SystemProcessRunner,
};
pub use qemu::{PreflightError, QemuPreflight, QemuState};
