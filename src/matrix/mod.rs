//! Build matrix planner
//!
//! Expands a host/client architecture selection into an ordered job list:
//! the host image, then one client image per distinct client architecture,
//! then one test per pairing. Planning is pure; nothing here touches docker.
//!
//! The order is a contract:
//! - the host build precedes every client build
//! - every client build precedes every test
//! - clients keep their input order

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use distcc_cross_arch::ArchError;
use serde::{Deserialize, Serialize};

use crate::distro::{Distro, DistroError, Role};
use crate::job::{generate_run_id, ImageSpec, Job, TestSpec};

/// Schema version for matrix.json
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier for matrix.json
pub const SCHEMA_ID: &str = "distcc-cross/matrix@1";

/// Planning errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    UnknownArchitecture(#[from] ArchError),

    #[error(transparent)]
    Distro(#[from] DistroError),
}

/// Settings the planner needs, passed in explicitly at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Directory holding the rendered `<slug>/` trees
    pub project_dir: PathBuf,

    /// Image repository prefix (e.g., "elijahru")
    pub repository_prefix: String,
}

/// A host/client selection for one distro
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRequest {
    pub distro: String,
    pub host_arch: String,
    pub client_archs: Vec<String>,
    pub tag: String,
}

/// Ordered jobs for one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMatrix {
    pub schema_version: u32,
    pub schema_id: String,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub jobs: Vec<Job>,
}

impl BuildMatrix {
    fn new(jobs: Vec<Job>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            run_id: generate_run_id(),
            created_at: Utc::now(),
            jobs,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn build_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.is_build()).count()
    }

    pub fn test_count(&self) -> usize {
        self.len() - self.build_count()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }
}

impl std::fmt::Display for BuildMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Build Matrix ===")?;
        writeln!(f)?;
        writeln!(f, "Run ID: {}", self.run_id)?;
        writeln!(
            f,
            "Jobs ({}: {} build, {} test):",
            self.len(),
            self.build_count(),
            self.test_count()
        )?;
        for (i, job) in self.jobs.iter().enumerate() {
            writeln!(f, "  [{}] {}", i + 1, job)?;
        }
        Ok(())
    }
}

/// Pure planner over the distro registry
#[derive(Debug, Clone)]
pub struct BuildMatrixPlanner {
    config: PlannerConfig,
}

impl BuildMatrixPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan host build, client builds, then host×client tests
    pub fn plan(&self, request: &MatrixRequest) -> Result<BuildMatrix, PlanError> {
        if request.host_arch.trim().is_empty() {
            return Err(PlanError::InvalidInput(
                "host architecture is required".to_string(),
            ));
        }
        if request.client_archs.is_empty() {
            return Err(PlanError::InvalidInput(
                "at least one client architecture is required".to_string(),
            ));
        }
        if request.client_archs.iter().any(|a| a.trim().is_empty()) {
            return Err(PlanError::InvalidInput(
                "client architecture must not be empty".to_string(),
            ));
        }

        let distro = Distro::get(&request.distro)?;
        let clients = distinct(&request.client_archs);

        let catalog = distro.catalog();
        catalog.lookup(&request.host_arch)?;
        for client in &clients {
            catalog.lookup(client)?;
        }
        ensure_offered(distro, Role::Host, &request.host_arch)?;
        for client in &clients {
            ensure_offered(distro, Role::Client, client)?;
        }

        let mut jobs = Vec::with_capacity(1 + clients.len() * 2);
        jobs.push(Job::Build(self.image(
            distro,
            Role::Host,
            &request.host_arch,
            &request.tag,
        )));
        for client in &clients {
            jobs.push(Job::Build(self.image(distro, Role::Client, client, &request.tag)));
        }
        for client in &clients {
            jobs.push(Job::Test(self.test_spec(distro, &request.host_arch, client)));
        }

        let matrix = BuildMatrix::new(jobs);
        tracing::debug!(
            run_id = %matrix.run_id,
            distro = distro.name,
            host = %request.host_arch,
            jobs = matrix.len(),
            "planned build matrix"
        );
        Ok(matrix)
    }

    /// A single image build
    pub fn plan_build(
        &self,
        distro: &str,
        role: Role,
        arch: &str,
        tag: &str,
    ) -> Result<BuildMatrix, PlanError> {
        if arch.trim().is_empty() {
            return Err(PlanError::InvalidInput(format!("{} architecture is required", role)));
        }
        let distro = Distro::get(distro)?;
        distro.catalog().lookup(arch)?;
        ensure_offered(distro, role, arch)?;

        Ok(BuildMatrix::new(vec![Job::Build(self.image(distro, role, arch, tag))]))
    }

    /// A single test of already-built images
    pub fn plan_test(
        &self,
        distro: &str,
        host_arch: &str,
        client_arch: &str,
    ) -> Result<BuildMatrix, PlanError> {
        if host_arch.trim().is_empty() || client_arch.trim().is_empty() {
            return Err(PlanError::InvalidInput(
                "host and client architectures are required".to_string(),
            ));
        }
        let distro = Distro::get(distro)?;
        let catalog = distro.catalog();
        catalog.lookup(host_arch)?;
        catalog.lookup(client_arch)?;
        ensure_offered(distro, Role::Host, host_arch)?;
        ensure_offered(distro, Role::Client, client_arch)?;

        Ok(BuildMatrix::new(vec![Job::Test(self.test_spec(
            distro,
            host_arch,
            client_arch,
        ))]))
    }

    /// Every host image then every client image, for every registered distro
    pub fn plan_all(&self, tag: &str) -> BuildMatrix {
        let jobs = Distro::all()
            .iter()
            .flat_map(|distro| {
                let hosts = distro
                    .host_archs
                    .iter()
                    .map(move |arch| (distro, Role::Host, *arch));
                let clients = distro
                    .client_archs
                    .iter()
                    .map(move |arch| (distro, Role::Client, *arch));
                hosts.chain(clients)
            })
            .map(|(distro, role, arch)| Job::Build(self.image(distro, role, arch, tag)))
            .collect();
        BuildMatrix::new(jobs)
    }

    fn image(&self, distro: &Distro, role: Role, arch: &str, tag: &str) -> ImageSpec {
        let project_dir = &self.config.project_dir;
        let image = distro.image(&self.config.repository_prefix, role, tag, arch);
        ImageSpec {
            role,
            distro: distro.name.to_string(),
            arch: arch.to_string(),
            cache_from: image.clone(),
            tag: image,
            dockerfile: distro.dockerfile(project_dir, role, arch),
            context: distro.build_context(project_dir, role),
        }
    }

    fn test_spec(&self, distro: &Distro, host_arch: &str, client_arch: &str) -> TestSpec {
        TestSpec {
            distro: distro.name.to_string(),
            host_arch: host_arch.to_string(),
            client_distro: distro.name.to_string(),
            client_arch: client_arch.to_string(),
            compose_file: distro.compose_file(&self.config.project_dir, host_arch, client_arch),
        }
    }
}

fn ensure_offered(distro: &Distro, role: Role, arch: &str) -> Result<(), PlanError> {
    if distro.supports(role, arch) {
        return Ok(());
    }
    Err(PlanError::InvalidInput(format!(
        "{} does not offer a {} image for {} (available: {})",
        distro.name,
        role,
        arch,
        distro.archs(role).join(", ")
    )))
}

/// First occurrence of each id, input order preserved
fn distinct(ids: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(id.clone());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> BuildMatrixPlanner {
        BuildMatrixPlanner::new(PlannerConfig {
            project_dir: PathBuf::from("/work"),
            repository_prefix: "elijahru".to_string(),
        })
    }

    fn request(host: &str, clients: &[&str]) -> MatrixRequest {
        MatrixRequest {
            distro: "debian:buster".to_string(),
            host_arch: host.to_string(),
            client_archs: clients.iter().map(|c| c.to_string()).collect(),
            tag: "devel".to_string(),
        }
    }

    #[test]
    fn test_plan_order() {
        let matrix = planner().plan(&request("amd64", &["arm64v8", "s390x"])).unwrap();

        assert_eq!(matrix.len(), 5);
        let summary: Vec<String> = matrix.jobs.iter().map(|j| j.to_string()).collect();
        assert!(summary[0].starts_with("build host amd64"));
        assert!(summary[1].starts_with("build client arm64v8"));
        assert!(summary[2].starts_with("build client s390x"));
        assert_eq!(summary[3], "test debian:buster host-amd64 client-arm64v8");
        assert_eq!(summary[4], "test debian:buster host-amd64 client-s390x");
    }

    #[test]
    fn test_image_spec_fields() {
        let matrix = planner().plan(&request("amd64", &["arm64v8"])).unwrap();
        let Job::Build(host) = &matrix.jobs[0] else {
            panic!("expected build job");
        };
        assert_eq!(host.tag, "elijahru/distcc-cross-compiler-host-debian-buster:devel-amd64");
        assert_eq!(host.cache_from, host.tag);
        assert_eq!(
            host.dockerfile,
            PathBuf::from("/work/debian-buster/host/Dockerfile.amd64")
        );
        assert_eq!(host.context, PathBuf::from("/work/debian-buster/host/build-context"));
    }

    #[test]
    fn test_empty_host_is_invalid_input() {
        let err = planner().plan(&request("", &["arm64v8"])).unwrap_err();
        assert!(matches!(err, PlanError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_clients_is_invalid_input() {
        let err = planner().plan(&request("amd64", &[])).unwrap_err();
        assert!(matches!(err, PlanError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_checks_precede_distro_lookup() {
        let mut req = request("", &[]);
        req.distro = "alpine".to_string();
        assert!(matches!(planner().plan(&req), Err(PlanError::InvalidInput(_))));
    }

    #[test]
    fn test_unknown_client_arch() {
        let err = planner().plan(&request("amd64", &["arm64v8", "mips"])).unwrap_err();
        match err {
            PlanError::UnknownArchitecture(ArchError::UnknownArchitecture { id, .. }) => {
                assert_eq!(id, "mips")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_arch_not_offered_by_distro() {
        let req = MatrixRequest {
            distro: "archlinux".to_string(),
            host_arch: "arm64v8".to_string(),
            client_archs: vec!["amd64".to_string()],
            tag: "devel".to_string(),
        };
        let err = planner().plan(&req).unwrap_err();
        assert!(matches!(err, PlanError::InvalidInput(_)));
        assert!(err.to_string().contains("archlinux does not offer a host image"));
    }

    #[test]
    fn test_arm32v6_unknown_to_debian() {
        let err = planner().plan(&request("amd64", &["arm32v6"])).unwrap_err();
        assert!(matches!(err, PlanError::UnknownArchitecture(_)));
    }

    #[test]
    fn test_unknown_distro() {
        let mut req = request("amd64", &["s390x"]);
        req.distro = "alpine".to_string();
        assert!(matches!(planner().plan(&req), Err(PlanError::Distro(_))));
    }

    #[test]
    fn test_duplicate_clients_collapse() {
        let matrix = planner()
            .plan(&request("amd64", &["s390x", "i386", "s390x"]))
            .unwrap();
        assert_eq!(matrix.build_count(), 3);
        assert_eq!(matrix.test_count(), 2);
    }

    #[test]
    fn test_plan_build_single() {
        let matrix = planner()
            .plan_build("archlinux", Role::Client, "arm32v6", "nightly")
            .unwrap();
        assert_eq!(matrix.len(), 1);
        assert!(matrix.jobs[0]
            .to_string()
            .contains("elijahru/distcc-cross-compiler-client-archlinux:nightly-arm32v6"));
    }

    #[test]
    fn test_plan_test_single() {
        let matrix = planner().plan_test("debian:buster", "amd64", "ppc64le").unwrap();
        let Job::Test(spec) = &matrix.jobs[0] else {
            panic!("expected test job");
        };
        assert_eq!(
            spec.compose_file,
            PathBuf::from(
                "/work/debian-buster/docker-compose.debian-buster.host-amd64.client-ppc64le.yml"
            )
        );
    }

    #[test]
    fn test_plan_all_covers_every_distro() {
        let matrix = planner().plan_all("devel");
        let expected: usize = Distro::all()
            .iter()
            .map(|d| d.host_archs.len() + d.client_archs.len())
            .sum();
        assert_eq!(matrix.len(), expected);
        assert_eq!(matrix.test_count(), 0);
        assert!(matrix.jobs[0].to_string().starts_with("build host amd64"));
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = planner().plan_all("devel");
        let b = planner().plan_all("devel");
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_display_numbers_jobs_from_one() {
        let matrix = planner().plan(&request("amd64", &["s390x"])).unwrap();
        let text = matrix.to_string();
        assert!(text.contains("Jobs (3: 2 build, 1 test):"));
        assert!(text.contains("  [1] build host amd64"));
        assert!(text.contains("  [3] test debian:buster host-amd64 client-s390x"));
    }

    #[test]
    fn test_matrix_json() {
        let matrix = planner().plan(&request("amd64", &["s390x"])).unwrap();
        let value: serde_json::Value = serde_json::from_str(&matrix.to_json().unwrap()).unwrap();
        assert_eq!(value["schema_id"], SCHEMA_ID);
        assert_eq!(value["jobs"][2]["kind"], "test");
    }
}
