//! Connector setup and the connected client.
//!
//! [`Connector`] holds validated settings and the shared observer registry.
//! [`Connector::connect`] resolves the document once, derives method names,
//! binds each operation to its credential and the shared [`Interceptor`], and
//! returns the same [`SwaggerClient`] on every later call.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::auth::{Authorization, resolve_authorizations, select_authorization};
use crate::cache::{CacheModel, CacheStore, ResponseCache, StoreRegistry};
use crate::config::ConnectorSettings;
use crate::error::{ConfigError, ConnectorError};
use crate::hooks::{HookEvent, Observer, ObserverRegistry};
use crate::operations::{Operation, OperationTable, method_name};
use crate::pipeline::Interceptor;
use crate::request::CallOptions;
use crate::response::ApiResponse;
use crate::spec::{SpecSource, Specification, resolve_spec, validate_spec};
use crate::transport::{HyperTransport, Transport, TransportConfig};

/// Builder for [`Connector`] with host-supplied collaborators.
pub struct ConnectorBuilder {
    settings: ConnectorSettings,
    transport: Option<Arc<dyn Transport>>,
    transport_config: TransportConfig,
    cache_store: Option<Arc<dyn CacheStore>>,
    store_registry: Option<Arc<dyn StoreRegistry>>,
}

impl fmt::Debug for ConnectorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorBuilder")
            .field("settings", &self.settings)
            .field("custom_transport", &self.transport.is_some())
            .field("transport_config", &self.transport_config)
            .field("cache_store", &self.cache_store.is_some())
            .field("store_registry", &self.store_registry.is_some())
            .finish()
    }
}

impl ConnectorBuilder {
    #[must_use]
    pub fn new(settings: ConnectorSettings) -> Self {
        Self {
            settings,
            transport: None,
            transport_config: TransportConfig::default(),
            cache_store: None,
            store_registry: None,
        }
    }

    /// Replace the default hyper transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Configuration for the default transport; ignored with a custom one.
    #[must_use]
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    /// Cache store used directly, making `cache.model` optional.
    #[must_use]
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    /// Registry that resolves `cache.model` names.
    #[must_use]
    pub fn store_registry(mut self, registry: Arc<dyn StoreRegistry>) -> Self {
        self.store_registry = Some(registry);
        self
    }

    fn response_cache(&mut self) -> Result<Option<ResponseCache>, ConfigError> {
        let Some(settings) = self.settings.cache.take() else {
            if self.cache_store.is_some() {
                return Err(ConfigError::InvalidCache(
                    "a cache store was supplied without `cache` settings".to_owned(),
                ));
            }
            return Ok(None);
        };
        let ttl = settings.ttl()?;
        let model = match (self.cache_store.take(), settings.model) {
            (Some(store), _) => CacheModel::Store(store),
            (None, Some(name)) if !name.is_empty() => CacheModel::Named(name),
            (None, _) => {
                return Err(ConfigError::InvalidCache("`model` is required".to_owned()));
            }
        };
        Ok(Some(ResponseCache::new(model, ttl, self.store_registry.take())))
    }

    /// Validate settings and assemble the connector. No network activity.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for a missing spec, a malformed cache setting or
    /// an unusable `security` setting, [`SpecError::InvalidSpecType`](crate::SpecError::InvalidSpecType)
    /// for a spec that is neither an object nor a string, and
    /// [`TransportError`](crate::TransportError) when the default transport cannot be created.
    pub fn build(mut self) -> Result<Connector, ConnectorError> {
        let spec = self.settings.spec.take().ok_or(ConfigError::MissingSpec)?;
        let source = SpecSource::classify(&spec)?;
        let cache = self.response_cache()?;

        let transport: Arc<dyn Transport> = match self.transport.take() {
            Some(transport) => transport,
            None => Arc::new(HyperTransport::new(self.transport_config)?),
        };

        let settings = self.settings;
        tracing::debug!(
            spec = ?source,
            url = ?settings.url,
            cache = ?cache,
            validate = settings.validate,
            "swagger connector settings"
        );

        let observers = Arc::new(ObserverRegistry::new());
        let interceptor = Arc::new(Interceptor::new(
            settings.user_agent(),
            Arc::clone(&observers),
            cache.map(Arc::new),
            Arc::clone(&transport),
        ));

        Ok(Connector {
            source,
            url: settings.url,
            security: settings.security.map(|config| Arc::new(Authorization::from(config))),
            authorizations: settings.authorizations,
            validate: settings.validate,
            reserved_methods: settings.reserved_methods,
            transport,
            observers,
            interceptor,
            client: OnceCell::new(),
        })
    }
}

/// Data source connector for one OpenAPI/Swagger document.
pub struct Connector {
    source: SpecSource,
    url: Option<String>,
    security: Option<Arc<Authorization>>,
    authorizations: Map<String, Value>,
    validate: bool,
    reserved_methods: Vec<String>,
    transport: Arc<dyn Transport>,
    observers: Arc<ObserverRegistry>,
    interceptor: Arc<Interceptor>,
    client: OnceCell<Arc<SwaggerClient>>,
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("source", &self.source)
            .field("url", &self.url)
            .field("validate", &self.validate)
            .field("observers", &self.observers)
            .field("connected", &self.client.initialized())
            .finish_non_exhaustive()
    }
}

impl Connector {
    /// # Errors
    /// See [`ConnectorBuilder::build`].
    pub fn new(settings: ConnectorSettings) -> Result<Self, ConnectorError> {
        ConnectorBuilder::new(settings).build()
    }

    #[must_use]
    pub fn builder(settings: ConnectorSettings) -> ConnectorBuilder {
        ConnectorBuilder::new(settings)
    }

    /// Register an observer; works before and after connecting.
    pub fn observe(&self, event: HookEvent, observer: impl Observer + 'static) {
        self.observers.observe(event, Arc::new(observer));
    }

    #[must_use]
    pub fn observers(&self) -> &Arc<ObserverRegistry> {
        &self.observers
    }

    /// Client built by an earlier successful [`connect`](Self::connect).
    #[must_use]
    pub fn client(&self) -> Option<&Arc<SwaggerClient>> {
        self.client.get()
    }

    /// Resolve the document and build the operation table.
    ///
    /// Runs setup once; later calls, including concurrent ones, get the same
    /// client. A failed setup is retried by the next call.
    ///
    /// # Errors
    /// Spec resolution, validation and `authorizations` failures.
    pub async fn connect(&self) -> Result<Arc<SwaggerClient>, ConnectorError> {
        self.client
            .get_or_try_init(|| self.setup())
            .await
            .map(Arc::clone)
    }

    async fn setup(&self) -> Result<Arc<SwaggerClient>, ConnectorError> {
        let resolved = resolve_spec(&self.source, self.transport.as_ref()).await?;
        if self.validate {
            validate_spec(&resolved.document)?;
        }
        let spec = Specification::from_document(resolved.document, resolved.source_url.as_ref())?;
        let base_url = self.url.clone().or_else(|| spec.base_url.clone());
        let authorizations = resolve_authorizations(&spec.security_schemes, &self.authorizations)?;

        let mut operations = OperationTable::new();
        for op in &spec.operations {
            let name = method_name(&op.api_group, &op.name, |candidate| {
                self.reserved_methods.iter().any(|r| r == candidate) || operations.contains(candidate)
            });
            let authorization = select_authorization(spec.security_for(op), &authorizations)
                .cloned()
                .or_else(|| self.security.clone());
            tracing::debug!(api = %op.api_group, operation = %op.name, method = %name, "adding method");
            operations.insert(Operation::new(
                name,
                Arc::new(op.clone()),
                authorization,
                base_url.clone(),
                Arc::clone(&self.interceptor),
            ));
        }

        tracing::info!(
            title = spec.title().unwrap_or("untitled"),
            version = %spec.version,
            operations = operations.len(),
            base_url = base_url.as_deref().unwrap_or("none"),
            "swagger connector connected"
        );

        Ok(Arc::new(SwaggerClient {
            spec: Arc::new(spec),
            base_url,
            operations,
            interceptor: Arc::clone(&self.interceptor),
        }))
    }
}

/// Connected client: the resolved document and its bound operations.
#[derive(Debug)]
pub struct SwaggerClient {
    spec: Arc<Specification>,
    base_url: Option<String>,
    operations: OperationTable,
    interceptor: Arc<Interceptor>,
}

impl SwaggerClient {
    #[must_use]
    pub fn spec(&self) -> &Arc<Specification> {
        &self.spec
    }

    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    #[must_use]
    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        self.interceptor.user_agent()
    }

    /// Operation by exposed method name or operationId.
    #[must_use]
    pub fn operation(&self, name: &str) -> Option<&Arc<Operation>> {
        self.operations.find(name)
    }

    /// Ad-hoc invocation by operationId or exposed method name.
    ///
    /// # Errors
    /// Returns [`ConnectorError::UnknownOperation`] for an unknown name, and
    /// otherwise whatever the operation's invocation fails with.
    pub async fn execute(
        &self,
        operation_id: &str,
        params: &Map<String, Value>,
        options: &CallOptions,
    ) -> Result<ApiResponse, ConnectorError> {
        let operation = self
            .operation(operation_id)
            .ok_or_else(|| ConnectorError::UnknownOperation(operation_id.to_owned()))?;
        operation.call(params, options).await
    }
}
