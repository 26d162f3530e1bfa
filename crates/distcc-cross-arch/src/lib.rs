//! Architecture catalog for distcc cross-compiler images
//!
//! Static registry of the CPU architectures the images are built for, and the
//! machine identifier (`uname -m`) each one is expected to report inside a
//! running container.
//!
//! Two catalog variants exist because the two verification flavours disagree
//! on a few identifiers:
//!
//! | Architecture id | Debian | ArchLinux |
//! |---|---|---|
//! | amd64   | x86_64  | x86_64  |
//! | i386    | i686    | i686    |
//! | arm32v6 | -       | arm     |
//! | arm32v7 | armv7l  | arm     |
//! | arm64v8 | aarch64 | aarch64 |
//! | ppc64le | ppc64le | ppc64el |
//! | s390x   | s390x   | s390x   |
//!
//! The disagreement is kept as two tables rather than merged into one.

use serde::{Deserialize, Serialize};

/// A supported CPU architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Architecture {
    /// Docker-style architecture id (e.g., "arm64v8")
    pub id: &'static str,

    /// Machine identifier reported by `uname -m` (e.g., "aarch64")
    pub machine: &'static str,
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.machine)
    }
}

/// Which verification flavour's identifier table to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogVariant {
    /// Debian-like images: arm32v7 reports `armv7l`, ppc64le reports `ppc64le`
    #[default]
    Debian,
    /// ArchLinux-like images: adds arm32v6, both arm ids report `arm`, ppc64le reports `ppc64el`
    ArchLinux,
}

impl CatalogVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogVariant::Debian => "debian",
            CatalogVariant::ArchLinux => "archlinux",
        }
    }

    fn table(&self) -> &'static [Architecture] {
        match self {
            CatalogVariant::Debian => DEBIAN_TABLE,
            CatalogVariant::ArchLinux => ARCHLINUX_TABLE,
        }
    }
}

impl std::fmt::Display for CatalogVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CatalogVariant {
    type Err = ArchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debian" => Ok(CatalogVariant::Debian),
            "archlinux" => Ok(CatalogVariant::ArchLinux),
            _ => Err(ArchError::UnknownVariant(s.to_string())),
        }
    }
}

const DEBIAN_TABLE: &[Architecture] = &[
    Architecture { id: "amd64", machine: "x86_64" },
    Architecture { id: "i386", machine: "i686" },
    Architecture { id: "arm32v7", machine: "armv7l" },
    Architecture { id: "arm64v8", machine: "aarch64" },
    Architecture { id: "ppc64le", machine: "ppc64le" },
    Architecture { id: "s390x", machine: "s390x" },
];

const ARCHLINUX_TABLE: &[Architecture] = &[
    Architecture { id: "amd64", machine: "x86_64" },
    Architecture { id: "i386", machine: "i686" },
    Architecture { id: "arm32v6", machine: "arm" },
    Architecture { id: "arm32v7", machine: "arm" },
    Architecture { id: "arm64v8", machine: "aarch64" },
    Architecture { id: "ppc64le", machine: "ppc64el" },
    Architecture { id: "s390x", machine: "s390x" },
];

/// Catalog lookup errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArchError {
    #[error("unknown architecture '{id}' (supported: {})", .supported.join(", "))]
    UnknownArchitecture { id: String, supported: Vec<String> },

    #[error("unknown catalog variant '{0}' (expected: debian, archlinux)")]
    UnknownVariant(String),
}

/// Read-only architecture registry for one catalog variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchCatalog {
    variant: CatalogVariant,
}

impl ArchCatalog {
    pub const fn new(variant: CatalogVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> CatalogVariant {
        self.variant
    }

    /// Look up an architecture by id
    pub fn lookup(&self, id: &str) -> Result<Architecture, ArchError> {
        self.variant
            .table()
            .iter()
            .find(|arch| arch.id == id)
            .copied()
            .ok_or_else(|| ArchError::UnknownArchitecture {
                id: id.to_string(),
                supported: self.ids().map(str::to_string).collect(),
            })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.variant.table().iter().any(|arch| arch.id == id)
    }

    /// Supported ids in declaration order
    pub fn ids(&self) -> impl Iterator<Item = &'static str> {
        self.variant.table().iter().map(|arch| arch.id)
    }

    pub fn architectures(&self) -> &'static [Architecture] {
        self.variant.table()
    }
}
