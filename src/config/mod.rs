//! Gateway configuration
//!
//! Three layers, later layers win:
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config`, or /etc/gol-gateway/gateway.toml when present)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::{
    ClusterSettings, GatewayConfig, MetricsSettings, ServerConfig, DEFAULT_CONFIG_PATH,
};
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use merge::{deep_merge, merge_layers, set_path};
