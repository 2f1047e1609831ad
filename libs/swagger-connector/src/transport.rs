use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tower::timeout::{Timeout, TimeoutLayer};
use tower::{ServiceBuilder, ServiceExt};

use crate::error::TransportError;
use crate::headers::Headers;
use crate::request::RequestContext;
use crate::response::ApiResponse;

/// Performs the network I/O for one request.
///
/// Implementations return `Ok` for every HTTP status; mapping 4xx/5xx to
/// failures is the pipeline's job.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    /// Returns a [`TransportError`] for connection, TLS, timeout or body failures.
    async fn execute(&self, request: RequestContext) -> Result<ApiResponse, TransportError>;
}

/// Settings for [`HyperTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request deadline, covering connect, send, response headers and body
    pub request_timeout: Duration,
    /// Upper bound for buffered response bodies
    pub max_body_size: usize,
    /// Idle pooled connections are closed after this long; `None` keeps them
    pub pool_idle_timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

type HyperClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Default transport: hyper-util pooled client over rustls, behind a tower timeout.
///
/// Plain `http://` is allowed because specs routinely point at local services.
#[derive(Clone)]
pub struct HyperTransport {
    service: Timeout<HyperClient>,
    config: TransportConfig,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// # Errors
    /// Returns [`TransportError::Tls`] when the TLS connector cannot be built.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(crypto_provider())
            .map_err(|e| TransportError::Tls(Box::new(e)))?
            .https_or_http()
            .enable_all_versions()
            .build();

        let mut client_builder = Client::builder(TokioExecutor::new());
        // pool_timer is required for pool_idle_timeout to take effect
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host);
        if let Some(idle_timeout) = config.pool_idle_timeout {
            client_builder.pool_idle_timeout(idle_timeout);
        }
        let client = client_builder.build::<_, Full<Bytes>>(https);

        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(config.request_timeout))
            .service(client);

        Ok(Self { service, config })
    }

    /// # Errors
    /// See [`HyperTransport::new`].
    pub fn with_defaults() -> Result<Self, TransportError> {
        Self::new(TransportConfig::default())
    }

    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

/// Installed default crypto provider, or aws-lc-rs without installing it globally.
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn to_http_request(request: RequestContext) -> Result<http::Request<Full<Bytes>>, TransportError> {
    let mut builder = http::Request::builder()
        .method(request.method)
        .uri(request.url.as_str());
    for (name, value) in request.headers.iter() {
        builder = builder.header(name, value);
    }
    builder
        .body(Full::new(request.body.unwrap_or_default()))
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))
}

fn map_tower_error(err: tower::BoxError, timeout: Duration) -> TransportError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return TransportError::Timeout(timeout);
    }
    TransportError::Transport(err)
}

#[async_trait]
impl Transport for HyperTransport {
    async fn execute(&self, request: RequestContext) -> Result<ApiResponse, TransportError> {
        let url = request.url.clone();
        let method = request.method.clone();
        let http_request = to_http_request(request)?;

        let timeout = self.config.request_timeout;
        let deadline = tokio::time::Instant::now() + timeout;
        let response = self
            .service
            .clone()
            .oneshot(http_request)
            .await
            .map_err(|e| map_tower_error(e, timeout))?;

        let (parts, body) = response.into_parts();
        let limit = self.config.max_body_size;
        let body = tokio::time::timeout_at(deadline, Limited::new(body, limit).collect())
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    TransportError::BodyTooLarge { limit }
                } else {
                    TransportError::Transport(e)
                }
            })?
            .to_bytes();

        tracing::trace!(%method, %url, status = parts.status.as_u16(), bytes = body.len(), "response received");

        Ok(ApiResponse::new(
            url,
            parts.status,
            Headers::from(&parts.headers),
            body,
        ))
    }
}
