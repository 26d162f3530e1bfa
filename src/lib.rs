//! distcc-cross - multi-architecture distcc cross-compiler lane
//!
//! Plans and runs the build-and-verify matrix for the distcc/ccache
//! cross-compiler images: host image, client images, then one
//! host/client verification per pairing. Jobs run one at a time and the
//! first failure stops the run.

pub mod config;
pub mod distro;
pub mod host;
pub mod job;
pub mod matrix;
pub mod mock;
pub mod pipeline;
pub mod run;
pub mod summary;
pub mod telemetry;

pub use config::{EffectiveConfig, LaneConfig};
pub use distcc_cross_arch::{ArchCatalog, ArchError, Architecture, CatalogVariant};
pub use distro::{Distro, Role};
pub use job::{ImageSpec, Job, TestSpec};
pub use matrix::{BuildMatrix, BuildMatrixPlanner, MatrixRequest, PlanError, PlannerConfig};
pub use pipeline::{LaneError, Pipeline, PipelineConfig};
pub use run::{DockerBackend, JobBackend, JobError, JobExecutor, Outcome, RunReport};
pub use summary::{ExitCode, FailureKind, RunSummary};
