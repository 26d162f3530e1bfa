//! Built-in defaults (layer 1) and the typed view of the merged config

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Compose invocation used by test jobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Program plus leading arguments (e.g., ["docker", "compose"])
    pub command: Vec<String>,

    /// Service running distccd
    pub host_service: String,

    /// Service running the verifier
    pub client_service: String,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            command: vec!["docker-compose".to_string()],
            host_service: "distcc-cross-compiler-host".to_string(),
            client_service: "distcc-cross-compiler-client".to_string(),
        }
    }
}

/// binfmt registration for foreign-architecture builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QemuConfig {
    pub enabled: bool,

    /// Image that registers the binfmt handlers
    pub image: String,

    /// Binary whose presence on PATH means qemu-user is installed
    pub probe_binary: String,
}

impl Default for QemuConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            image: "multiarch/qemu-user-static".to_string(),
            probe_binary: "qemu-aarch64".to_string(),
        }
    }
}

/// Typed lane configuration
///
/// Defaults double as the built-in layer; the merged layers deserialize back
/// into this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Directory holding the rendered `<slug>/` trees
    pub project_dir: PathBuf,

    /// Image repository prefix (default: "elijahru")
    pub repository_prefix: String,

    /// Image tag prefix (default: "devel")
    pub tag: String,

    /// Docker client program (default: "docker")
    pub docker: String,

    pub compose: ComposeConfig,

    /// Wait between starting the host service and running the client (default: 5)
    pub settle_seconds: u64,

    pub qemu: QemuConfig,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            repository_prefix: "elijahru".to_string(),
            tag: "devel".to_string(),
            docker: "docker".to_string(),
            compose: ComposeConfig::default(),
            settle_seconds: 5,
            qemu: QemuConfig::default(),
        }
    }
}

impl LaneConfig {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "project_dir": self.project_dir.to_string_lossy(),
            "repository_prefix": self.repository_prefix,
            "tag": self.tag,
            "docker": self.docker,
            "compose": {
                "command": self.compose.command,
                "host_service": self.compose.host_service,
                "client_service": self.compose.client_service
            },
            "settle_seconds": self.settle_seconds,
            "qemu": {
                "enabled": self.qemu.enabled,
                "image": self.qemu.image,
                "probe_binary": self.qemu.probe_binary
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = LaneConfig::default();
        assert_eq!(defaults.repository_prefix, "elijahru");
        assert_eq!(defaults.tag, "devel");
        assert_eq!(defaults.settle_seconds, 5);
        assert_eq!(defaults.compose.command, vec!["docker-compose"]);
        assert!(defaults.qemu.enabled);
    }

    #[test]
    fn test_to_value() {
        let value = LaneConfig::default().to_value();

        assert_eq!(value["tag"], "devel");
        assert_eq!(value["compose"]["host_service"], "distcc-cross-compiler-host");
        assert_eq!(value["qemu"]["image"], "multiarch/qemu-user-static");
    }

    #[test]
    fn test_value_round_trips_into_struct() {
        let defaults = LaneConfig::default();
        let parsed: LaneConfig = serde_json::from_value(defaults.to_value()).unwrap();
        assert_eq!(parsed, defaults);
    }

    #[test]
    fn test_partial_table_keeps_field_defaults() {
        let parsed: LaneConfig =
            serde_json::from_value(serde_json::json!({"qemu": {"enabled": false}})).unwrap();
        assert!(!parsed.qemu.enabled);
        assert_eq!(parsed.qemu.probe_binary, "qemu-aarch64");
        assert_eq!(parsed.docker, "docker");
    }
}
