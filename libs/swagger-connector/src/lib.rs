#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! OpenAPI/Swagger connector
//!
//! Turns an OpenAPI 3 or Swagger 2.0 document into a table of callable
//! operations. Every call runs through one request pipeline:
//! - `User-Agent` stamping and credential injection (basic, API key, `OAuth2`)
//! - `before execute` / `after execute` observer notification
//! - Optional GET response caching through a pluggable TTL store
//! - Dispatch through a pluggable [`Transport`] (hyper + rustls by default)
//!
//! # Example
//!
//! ```ignore
//! use swagger_connector::{CallOptions, Connector, ConnectorSettings, HookEvent, observer_fn};
//! use serde_json::json;
//!
//! let settings: ConnectorSettings = serde_json::from_value(json!({
//!     "spec": "./petstore.yaml",
//!     "cache": { "model": "memory", "ttl": 1000 },
//! }))?;
//!
//! let connector = Connector::new(settings)?;
//! connector.observe(HookEvent::BeforeExecute, observer_fn(|ctx| {
//!     tracing::debug!(event = %ctx.event(), "outgoing request");
//!     Ok(())
//! }));
//!
//! let client = connector.connect().await?;
//! let params = json!({ "petId": 1 });
//! let pet = client
//!     .execute("getPetById", params.as_object().unwrap(), &CallOptions::default())
//!     .await?;
//! ```

pub mod auth;
pub mod cache;
mod config;
mod connector;
mod error;
mod headers;
pub mod hooks;
pub mod invoke;
mod operations;
mod pipeline;
mod request;
mod response;
pub mod spec;
mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{Authorization, CredentialLocation, SecurityConfig};
pub use cache::{CacheModel, CacheStore, MemoryStore, NamedStores, ResponseCache, StoreRegistry, cache_key};
pub use config::{CacheSettings, ConnectorSettings, DEFAULT_USER_AGENT};
pub use connector::{Connector, ConnectorBuilder, SwaggerClient};
pub use error::{CacheError, ConfigError, ConnectorError, SpecError, TransportError};
pub use headers::Headers;
pub use hooks::{
    AfterExecute, BeforeExecute, HookContext, HookEvent, Observer, ObserverError,
    ObserverRegistry, observer_fn,
};
pub use invoke::{Callback, Invocation, InvocationFuture, InvocationResult, callback, dispatch};
pub use operations::{Operation, OperationTable, method_name};
pub use pipeline::Interceptor;
pub use request::{CallOptions, RequestContext};
pub use response::ApiResponse;
pub use spec::{Specification, SpecSource, resolve_spec, validate_spec};
pub use transport::{HyperTransport, Transport, TransportConfig};
