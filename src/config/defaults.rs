//! Typed gateway configuration and its built-in defaults (layer 1)

use std::path::PathBuf;
use std::time::Duration;

use gol_cluster::kube::SERVICE_ACCOUNT_DIR;
use gol_cluster::{ClusterError, KubeConfig};
use gol_protocol::{EngineKind, DEFAULT_MAX_REQUEST_BYTES};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::EngineSettings;
use crate::filter::ResultFilters;
use crate::poller::PollConfig;

use super::effective::ConfigError;

/// Default path of the optional TOML config file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gol-gateway/gateway.toml";

/// The full gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub poll: PollConfig,
    pub cluster: ClusterSettings,
    pub metrics: MetricsSettings,
    pub engines: EngineSettings,
}

/// The `[server]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:5000)
    pub bind: String,

    /// Seconds to wait for the request line (default: 30)
    pub read_timeout_seconds: u64,

    /// Longest accepted request line, in bytes (default: 1024)
    pub max_request_bytes: usize,

    /// Engine used by the two-field request form (default: spark)
    pub default_engine: EngineKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            read_timeout_seconds: 30,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            default_engine: EngineKind::Spark,
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }
}

/// The `[cluster]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    /// API server URL; in-cluster discovery when unset
    pub api_server: Option<String>,

    /// Inline bearer token, takes precedence over `token_path`
    pub token: Option<String>,

    pub token_path: PathBuf,
    pub ca_cert_path: PathBuf,
    pub insecure_skip_tls_verify: bool,

    /// Per-request HTTP timeout (default: 30)
    pub request_timeout_seconds: u64,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        let sa = PathBuf::from(SERVICE_ACCOUNT_DIR);
        Self {
            api_server: None,
            token: None,
            token_path: sa.join("token"),
            ca_cert_path: sa.join("ca.crt"),
            insecure_skip_tls_verify: false,
            request_timeout_seconds: 30,
        }
    }
}

impl ClusterSettings {
    /// Resolve credentials and endpoint into a client configuration.
    pub fn kube_config(&self) -> Result<KubeConfig, ClusterError> {
        let resolved = KubeConfig::resolve(
            self.api_server.as_deref(),
            &self.token_path,
            &self.ca_cert_path,
        )?;
        Ok(KubeConfig {
            token: self.token.clone().or(resolved.token),
            insecure_skip_tls_verify: self.insecure_skip_tls_verify,
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
            ..resolved
        })
    }
}

/// The `[metrics]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub elasticsearch_url: String,
    pub index: String,
    pub timeout_seconds: u64,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            elasticsearch_url: "http://elasticsearch.elasticsearch.svc.cluster.local:9200"
                .to_string(),
            index: "game-of-life-metrics".to_string(),
            timeout_seconds: 5,
        }
    }
}

impl MetricsSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl GatewayConfig {
    /// Built-in defaults as a JSON layer for merging
    pub fn builtin_value() -> Value {
        serde_json::to_value(Self::default()).unwrap_or(Value::Null)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.poll
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "server.bind must not be empty".to_string(),
            ));
        }

        // read_timeout_seconds must be in (0, 3600]
        if self.server.read_timeout_seconds == 0 || self.server.read_timeout_seconds > 3600 {
            return Err(ConfigError::Invalid(format!(
                "server.read_timeout_seconds must be in (0, 3600], got {}",
                self.server.read_timeout_seconds
            )));
        }

        // max_request_bytes must be in [16, 65536]
        if !(16..=65536).contains(&self.server.max_request_bytes) {
            return Err(ConfigError::Invalid(format!(
                "server.max_request_bytes must be in [16, 65536], got {}",
                self.server.max_request_bytes
            )));
        }

        if self.cluster.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "cluster.request_timeout_seconds must be positive".to_string(),
            ));
        }

        if self.metrics.enabled && self.metrics.elasticsearch_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "metrics.elasticsearch_url is required when metrics are enabled".to_string(),
            ));
        }

        let default_engine = self.engines.template(self.server.default_engine);
        if !default_engine.is_enabled() {
            return Err(ConfigError::Invalid(format!(
                "server.default_engine '{}' is disabled",
                self.server.default_engine
            )));
        }

        if self.engines.mpi.workers == 0 {
            return Err(ConfigError::Invalid(
                "engines.mpi.workers must be at least 1".to_string(),
            ));
        }

        ResultFilters::from_settings(&self.engines)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(())
    }
}
