use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::auth::SecurityConfig;
use crate::error::ConfigError;

/// `User-Agent` stamped on requests that do not carry one.
pub const DEFAULT_USER_AGENT: &str = concat!("swagger-connector/", env!("CARGO_PKG_VERSION"));

/// `cache` setting: store model and entry TTL in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    #[serde(default)]
    pub model: Option<String>,
    /// Milliseconds; non-positive values are rejected by [`CacheSettings::ttl`]
    #[serde(default)]
    pub ttl: Option<i64>,
}

impl CacheSettings {
    /// Validated TTL.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidCache`] when `ttl` is missing, zero or negative.
    pub fn ttl(&self) -> Result<Duration, ConfigError> {
        let Some(ms) = self.ttl else {
            return Err(ConfigError::InvalidCache(
                "`ttl` must be set to a positive number of milliseconds".to_owned(),
            ));
        };
        match u64::try_from(ms) {
            Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
            _ => Err(ConfigError::InvalidCache(format!(
                "`ttl` must be greater than zero, got {ms}"
            ))),
        }
    }
}

/// Connector settings, usually deserialized from the host's data source config.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ConnectorSettings {
    /// Inline document, URL or file path
    #[serde(default)]
    pub spec: Option<Value>,

    /// Overrides the base URL derived from the document
    #[serde(default)]
    pub url: Option<String>,

    /// Single credential applied to every operation without a per-scheme one
    #[serde(default)]
    pub security: Option<SecurityConfig>,

    /// Credentials keyed by security scheme name
    #[serde(default)]
    pub authorizations: Map<String, Value>,

    #[serde(default)]
    pub cache: Option<CacheSettings>,

    /// Run structural validation on connect
    #[serde(default)]
    pub validate: bool,

    #[serde(default, alias = "user_agent")]
    pub user_agent: Option<String>,

    /// Method names already exposed by the host model
    #[serde(default, alias = "reserved_methods")]
    pub reserved_methods: Vec<String>,
}

impl ConnectorSettings {
    #[must_use]
    pub fn with_spec(spec: Value) -> Self {
        Self {
            spec: Some(spec),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_full_settings() {
        let settings: ConnectorSettings = serde_json::from_value(json!({
            "spec": "http://localhost:3000/swagger",
            "url": "http://override.local/api",
            "security": { "type": "apiKey", "name": "api_key", "key": "abc12", "in": "query" },
            "authorizations": { "basic": { "username": "u", "password": "p" } },
            "cache": { "model": "EchoCache", "ttl": 100 },
            "validate": true,
            "userAgent": "my-agent/1.0",
            "reservedMethods": ["find"]
        }))
        .unwrap();

        assert_eq!(settings.spec, Some(json!("http://localhost:3000/swagger")));
        assert!(matches!(settings.security, Some(SecurityConfig::ApiKey { .. })));
        assert_eq!(settings.authorizations.len(), 1);
        assert_eq!(
            settings.cache,
            Some(CacheSettings {
                model: Some("EchoCache".to_owned()),
                ttl: Some(100),
            })
        );
        assert!(settings.validate);
        assert_eq!(settings.user_agent(), "my-agent/1.0");
        assert_eq!(settings.reserved_methods, vec!["find".to_owned()]);
    }

    #[test]
    fn test_defaults() {
        let settings: ConnectorSettings = serde_json::from_value(json!({})).unwrap();
        assert!(settings.spec.is_none());
        assert!(!settings.validate);
        assert_eq!(settings.user_agent(), DEFAULT_USER_AGENT);
        assert!(DEFAULT_USER_AGENT.starts_with("swagger-connector/"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = serde_json::from_value::<ConnectorSettings>(json!({ "spec": {}, "sepc": {} }))
            .unwrap_err();
        assert!(err.to_string().contains("sepc"));
    }

    #[test]
    fn test_cache_ttl_validation() {
        let missing = CacheSettings {
            model: Some("memory".to_owned()),
            ttl: None,
        };
        let zero = CacheSettings {
            model: Some("memory".to_owned()),
            ttl: Some(0),
        };
        let ok = CacheSettings {
            model: Some("memory".to_owned()),
            ttl: Some(250),
        };
        assert!(matches!(missing.ttl(), Err(ConfigError::InvalidCache(_))));
        assert!(matches!(zero.ttl(), Err(ConfigError::InvalidCache(_))));
        assert_eq!(ok.ttl().unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_negative_ttl_is_a_cache_error() {
        let settings: ConnectorSettings = serde_json::from_value(json!({
            "spec": {},
            "cache": { "model": "memory", "ttl": -100 }
        }))
        .unwrap();
        let cache = settings.cache.unwrap();
        assert_eq!(cache.ttl, Some(-100));

        let err = cache.ttl().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCache(_)));
        assert!(err.to_string().contains("-100"));
    }
}
