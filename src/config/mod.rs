//! Configuration merge system
//!
//! Implements the 4-layer configuration merge:
//! 1. Built-in defaults
//! 2. Host/user config (~/.config/distcc-cross/config.toml)
//! 3. Project config (./distcc-cross.toml)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::{ComposeConfig, LaneConfig, QemuConfig};
pub use effective::{
    default_host_config_path, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig,
    PROJECT_CONFIG_FILE,
};
pub use merge::{deep_merge, merge_layers};
