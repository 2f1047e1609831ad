use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use swagger_connector::{ConnectorSettings, MemoryStore, TransportConfig};

/// Environment prefix; nested keys are `__` separated, e.g. `SWAGGER__CONNECTOR__URL`.
pub const ENV_PREFIX: &str = "SWAGGER__";

/// Effective CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Connector settings, passed through to the library as-is
    pub connector: Map<String, Value>,
    pub transport: TransportSection,
    pub cache: CacheSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportSection {
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub max_body_size: usize,
}

/// In-memory store registered under `name` for `connector.cache.model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSection {
    pub name: String,
    pub max_entries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for TransportSection {
    fn default() -> Self {
        let defaults = TransportConfig::default();
        Self {
            request_timeout: defaults.request_timeout,
            max_body_size: defaults.max_body_size,
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            name: "memory".to_owned(),
            max_entries: MemoryStore::DEFAULT_MAX_ENTRIES,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            json: false,
        }
    }
}

/// Overrides taken from command-line flags, applied last.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub spec: Option<String>,
    pub url: Option<String>,
    pub log_json: bool,
}

impl AppConfig {
    /// Layered load: defaults, then the YAML file, then `SWAGGER__*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            if !path.is_file() {
                anyhow::bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("failed to load configuration")
    }

    pub fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(spec) = &overrides.spec {
            self.connector
                .insert("spec".to_owned(), Value::String(spec.clone()));
        }
        if let Some(url) = &overrides.url {
            self.connector
                .insert("url".to_owned(), Value::String(url.clone()));
        }
        if overrides.log_json {
            self.logging.json = true;
        }
    }

    pub fn connector_settings(&self) -> Result<ConnectorSettings> {
        serde_json::from_value(Value::Object(self.connector.clone()))
            .context("invalid `connector` settings")
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            request_timeout: self.transport.request_timeout,
            max_body_size: self.transport.max_body_size,
            ..TransportConfig::default()
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self).context("failed to render configuration")
    }
}
