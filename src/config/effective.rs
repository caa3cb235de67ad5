//! Effective configuration with provenance
//!
//! Records the merged configuration plus where each layer came from, and
//! carries the typed [`GatewayConfig`] the gateway actually runs with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::defaults::GatewayConfig;
use super::merge::merge_layers;

/// Schema version for the `config` command output
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "gol-gateway/effective_config@1";

/// Origin of a configuration layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing config layer with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// Set for file layers only, with the SHA-256 of the file's bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ConfigSource {
    fn layer(origin: ConfigOrigin) -> Self {
        Self {
            origin,
            path: None,
            digest: None,
        }
    }

    fn file(path: &Path, digest: String) -> Self {
        Self {
            origin: ConfigOrigin::File,
            path: Some(path.display().to_string()),
            digest: Some(digest),
        }
    }
}

/// Effective configuration with provenance
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub schema_version: u32,
    pub schema_id: String,

    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// The merged configuration, secrets redacted
    pub config: Value,

    /// Contributing layers in precedence order
    pub sources: Vec<ConfigSource>,

    /// Redacted key paths
    pub redactions: Vec<String>,

    /// Typed configuration, secrets intact
    #[serde(skip)]
    pub settings: GatewayConfig,
}

/// Key fragments that mark a value as secret
const SECRET_KEYS: &[&str] = &["password", "token", "secret", "api_key", "credential"];

const REDACTED: &str = "[REDACTED]";

impl EffectiveConfig {
    /// Build the effective config from builtin defaults, an optional TOML
    /// file, and CLI overrides.
    pub fn build(config_file: Option<&Path>, cli_overrides: Option<Value>) -> Result<Self, ConfigError> {
        let mut layers = vec![GatewayConfig::builtin_value()];
        let mut sources = vec![ConfigSource::layer(ConfigOrigin::Builtin)];

        if let Some(path) = config_file {
            let (value, digest) = read_config_file(path)?;
            layers.push(value);
            sources.push(ConfigSource::file(path, digest));
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource::layer(ConfigOrigin::Cli));
        }

        let mut merged = merge_layers(layers);

        let settings: GatewayConfig =
            serde_json::from_value(merged.clone()).map_err(|e| ConfigError::Shape(e.to_string()))?;
        settings.validate()?;

        let mut redactions = Vec::new();
        redact_secrets(&mut merged, "", &mut redactions);

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            config: merged,
            sources,
            redactions,
            settings,
        })
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Reads a gateway TOML file as a JSON layer, with the SHA-256 of its bytes.
fn read_config_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let digest = hex::encode(Sha256::digest(&bytes));

    let text = std::str::from_utf8(&bytes).map_err(|e| ConfigError::Toml {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    // Gateway settings hold no TOML datetimes, so tables map 1:1 onto JSON.
    let value: Value = toml::from_str(text).map_err(|e| ConfigError::Toml {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;
    Ok((value, digest))
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    // A `*_path` setting names where a secret lives, not the secret.
    !key.ends_with("_path") && SECRET_KEYS.iter().any(|s| key.contains(s))
}

/// Replaces secret scalars under `value` and records their dotted paths.
fn redact_secrets(value: &mut Value, prefix: &str, redactions: &mut Vec<String>) {
    let Value::Object(section) = value else {
        return;
    };
    for (key, entry) in section.iter_mut() {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match entry {
            Value::Object(_) => redact_secrets(entry, &path, redactions),
            Value::Null => {}
            _ if is_secret_key(key) => {
                *entry = Value::String(REDACTED.to_string());
                redactions.push(path);
            }
            _ => {}
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config file {} is not valid TOML: {message}", path.display())]
    Toml { path: PathBuf, message: String },

    #[error("config has the wrong shape: {0}")]
    Shape(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
