//! Build and test job descriptions
//!
//! A [`Job`] is pure data: it says what to build or test, never how. The
//! planner produces them and a backend consumes them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use crate::distro::Role;

/// Generate a new run identifier (lowercase ULID)
pub fn generate_run_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

/// One image to build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub role: Role,

    /// Distro name (e.g., "debian:buster")
    pub distro: String,

    /// Architecture id (e.g., "arm64v8")
    pub arch: String,

    /// Fully qualified output tag
    pub tag: String,

    pub dockerfile: PathBuf,

    /// Build context directory
    pub context: PathBuf,

    /// Tag pulled beforehand and passed as `--cache-from`
    pub cache_from: String,
}

/// One host/client pairing to exercise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpec {
    pub distro: String,
    pub host_arch: String,
    pub client_distro: String,
    pub client_arch: String,

    /// Compose file wiring the host and client services together
    pub compose_file: PathBuf,
}

/// A planned unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Job {
    Build(ImageSpec),
    Test(TestSpec),
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::Build(_) => "build",
            Job::Test(_) => "test",
        }
    }

    pub fn is_build(&self) -> bool {
        matches!(self, Job::Build(_))
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Job::Build(spec) => write!(f, "build {} {} ({})", spec.role, spec.arch, spec.tag),
            Job::Test(spec) => write!(
                f,
                "test {} host-{} client-{}",
                spec.distro, spec.host_arch, spec.client_arch
            ),
        }
    }
}
