//! Distro registry
//!
//! Each distro flavour ships a host image (distccd plus cross toolchains) and
//! client images (ccache + distcc front-end) for a fixed set of architectures.
//! Generated Dockerfiles and compose files live under `<project>/<slug>/`.

use std::path::{Path, PathBuf};

use distcc_cross_arch::{ArchCatalog, CatalogVariant};
use serde::{Deserialize, Serialize};

/// Image role within a distro
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// distccd server image
    Host,
    /// ccache/distcc client image
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Host => "host",
            Role::Client => "client",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A supported distro flavour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distro {
    /// Registry name (e.g., "debian:buster")
    pub name: &'static str,

    /// Machine identifier table used when verifying this distro's clients
    pub variant: CatalogVariant,

    /// Architectures a host image is built for
    pub host_archs: &'static [&'static str],

    /// Architectures a client image is built for
    pub client_archs: &'static [&'static str],

    /// distccd port per client architecture
    pub ports_by_arch: &'static [(&'static str, u16)],

    /// Cross toolchain per client architecture
    pub toolchains_by_arch: &'static [(&'static str, &'static str)],
}

const DEBIAN_ARCHS: &[&str] = &["amd64", "i386", "arm32v7", "arm64v8", "ppc64le", "s390x"];

static DISTROS: &[Distro] = &[
    Distro {
        name: "debian:buster",
        variant: CatalogVariant::Debian,
        host_archs: DEBIAN_ARCHS,
        client_archs: DEBIAN_ARCHS,
        ports_by_arch: &[
            ("i386", 3603),
            ("amd64", 3604),
            ("arm32v7", 3607),
            ("arm64v8", 3608),
            ("s390x", 3609),
            ("ppc64le", 3610),
        ],
        toolchains_by_arch: &[
            ("amd64", "x86_64-linux-gnu"),
            ("i386", "i686-linux-gnu"),
            ("ppc64le", "powerpc64le-linux-gnu"),
            ("s390x", "s390x-linux-gnu"),
            ("arm32v7", "arm-linux-gnueabihf"),
            ("arm64v8", "aarch64-linux-gnu"),
        ],
    },
    Distro {
        name: "archlinux",
        variant: CatalogVariant::ArchLinux,
        host_archs: &["amd64"],
        client_archs: &["amd64", "arm32v6", "arm32v7", "arm64v8"],
        ports_by_arch: &[
            ("amd64", 3704),
            ("arm32v6", 3706),
            ("arm32v7", 3707),
            ("arm64v8", 3708),
        ],
        toolchains_by_arch: &[
            ("arm32v6", "/toolchains/x-tools6h/arm-unknown-linux-gnueabihf"),
            ("arm32v7", "/toolchains/x-tools7h/arm-unknown-linux-gnueabihf"),
            ("arm64v8", "/toolchains/x-tools8/aarch64-unknown-linux-gnu"),
        ],
    },
];

/// Distro lookup errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DistroError {
    #[error("unsupported distro '{name}', choose from {}", .available.join(", "))]
    UnsupportedDistro { name: String, available: Vec<String> },
}

/// Replace every non-word character with `-` and lowercase the result
pub fn slugify(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '-' })
        .collect::<String>()
        .to_lowercase()
}

impl Distro {
    /// All registered distros, in registration order
    pub fn all() -> &'static [Distro] {
        DISTROS
    }

    /// Look up a distro by name
    pub fn get(name: &str) -> Result<&'static Distro, DistroError> {
        DISTROS
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| DistroError::UnsupportedDistro {
                name: name.to_string(),
                available: DISTROS.iter().map(|d| d.name.to_string()).collect(),
            })
    }

    pub fn slug(&self) -> String {
        slugify(self.name)
    }

    pub fn catalog(&self) -> ArchCatalog {
        ArchCatalog::new(self.variant)
    }

    pub fn archs(&self, role: Role) -> &'static [&'static str] {
        match role {
            Role::Host => self.host_archs,
            Role::Client => self.client_archs,
        }
    }

    pub fn supports(&self, role: Role, arch: &str) -> bool {
        self.archs(role).contains(&arch)
    }

    pub fn port(&self, arch: &str) -> Option<u16> {
        self.ports_by_arch
            .iter()
            .find(|(a, _)| *a == arch)
            .map(|(_, port)| *port)
    }

    pub fn toolchain(&self, arch: &str) -> Option<&'static str> {
        self.toolchains_by_arch
            .iter()
            .find(|(a, _)| *a == arch)
            .map(|(_, toolchain)| *toolchain)
    }

    /// `<arch> <distccd port> <toolchain>`, with `-` for anything unset
    pub fn client_summary(&self, arch: &str) -> String {
        let port = self
            .port(arch)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!("{} {} {}", arch, port, self.toolchain(arch).unwrap_or("-"))
    }

    /// Output directory for this distro's generated files
    pub fn out_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(self.slug())
    }

    /// `<slug>/<role>/Dockerfile.<arch>`
    pub fn dockerfile(&self, project_dir: &Path, role: Role, arch: &str) -> PathBuf {
        self.out_dir(project_dir)
            .join(role.as_str())
            .join(format!("Dockerfile.{}", arch))
    }

    /// `<slug>/<role>/build-context`
    pub fn build_context(&self, project_dir: &Path, role: Role) -> PathBuf {
        self.out_dir(project_dir).join(role.as_str()).join("build-context")
    }

    /// `<slug>/docker-compose.<slug>.host-<host>.client-<client>.yml`
    pub fn compose_file(&self, project_dir: &Path, host_arch: &str, client_arch: &str) -> PathBuf {
        let slug = self.slug();
        self.out_dir(project_dir).join(format!(
            "docker-compose.{}.host-{}.client-{}.yml",
            slug, host_arch, client_arch
        ))
    }

    /// `<prefix>/distcc-cross-compiler-<role>-<slug>:<tag>-<arch>`
    pub fn image(&self, repository_prefix: &str, role: Role, tag: &str, arch: &str) -> String {
        format!(
            "{}/distcc-cross-compiler-{}-{}:{}-{}",
            repository_prefix,
            role,
            self.slug(),
            tag,
            arch
        )
    }
}
