use std::time::Duration;
use thiserror::Error;

use crate::hooks::{HookEvent, ObserverError};
use crate::response::ApiResponse;

/// Fatal connector configuration problems, raised before any network activity.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// The `spec` setting is absent
    #[error("No swagger specification provided")]
    MissingSpec,

    /// The `cache` setting is malformed (missing model, missing or non-positive ttl)
    #[error("Invalid cache configuration: {0}")]
    InvalidCache(String),

    /// A `security` or `authorizations` entry cannot be turned into a strategy
    #[error("Invalid security configuration: {0}")]
    InvalidSecurity(String),
}

/// Failures while turning a spec reference into a [`Specification`](crate::Specification).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SpecError {
    /// Local spec file with an extension other than `.json`, `.yaml` or `.yml`
    #[error("Invalid specification file type: {path}")]
    InvalidFileType { path: String },

    /// Spec setting that is neither an object nor a string
    #[error("Invalid swagger specification type: expected object or string, got {found}")]
    InvalidSpecType { found: &'static str },

    /// Spec file could not be read
    #[error("Failed to read specification file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing error
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing failed: {0}")]
    Yaml(String),

    /// Remote spec could not be fetched
    #[error("Failed to fetch specification from '{url}': {reason}")]
    Fetch { url: String, reason: String },

    /// Document is not a Swagger 2.0 / OpenAPI 3 document this connector understands
    #[error("Unsupported specification document: {0}")]
    Unsupported(String),

    /// Structural validation found violations
    #[error("Specification is invalid: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Errors raised by a [`Transport`](crate::Transport) while performing network I/O.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// The request context cannot be expressed as an HTTP request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Request timed out
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// Transport error (network, connection, etc)
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// TLS error
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors raised by a [`CacheStore`](crate::CacheStore).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CacheError {
    #[error("Cache store failure: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Error returned from connecting and from every operation invocation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConnectorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A registered observer signalled failure
    #[error("'{event}' observer failed: {source}")]
    Observer {
        event: HookEvent,
        #[source]
        source: ObserverError,
    },

    /// The remote endpoint answered with a 4xx/5xx status
    #[error("HTTP {} from {}", .response.status, .response.url)]
    HttpStatus { response: Box<ApiResponse> },

    /// `execute` was called with a name that matches no operation
    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),

    /// A declared parameter is missing or cannot be encoded
    #[error("Invalid parameter '{name}': {reason}")]
    Parameter { name: String, reason: String },

    /// Neither the document nor the `url` setting provides a base URL
    #[error("No base URL available for operation '{0}'")]
    MissingBaseUrl(String),

    /// After-execute observers cleared both the response and the error
    #[error("After-execute observers left neither a response nor an error")]
    EmptyResult,
}

impl ConnectorError {
    /// Response carried by an [`HttpStatus`](Self::HttpStatus) error.
    #[must_use]
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            ConnectorError::HttpStatus { response } => Some(response),
            _ => None,
        }
    }
}
