use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::auth::Authorization;
use crate::error::ConnectorError;
use crate::invoke::{Callback, Invocation, InvocationFuture, dispatch};
use crate::pipeline::Interceptor;
use crate::request::{CallOptions, RequestContext, build_request};
use crate::response::ApiResponse;
use crate::spec::OperationSpec;

/// Exposed method name for an operation.
///
/// The bare operation name is used unless `taken` reports it as already
/// exposed, in which case the api group is prefixed: `pet_findByStatus`.
#[must_use]
pub fn method_name(api_group: &str, operation: &str, taken: impl Fn(&str) -> bool) -> String {
    if taken(operation) {
        format!("{api_group}_{operation}")
    } else {
        operation.to_owned()
    }
}

/// A spec operation bound to the shared request pipeline.
pub struct Operation {
    method_name: String,
    spec: Arc<OperationSpec>,
    authorization: Option<Arc<Authorization>>,
    base_url: Option<String>,
    interceptor: Arc<Interceptor>,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("method_name", &self.method_name)
            .field("method", &self.spec.method)
            .field("path", &self.spec.path)
            .field("base_url", &self.base_url)
            .field("authorized", &self.authorization.is_some())
            .finish_non_exhaustive()
    }
}

impl Operation {
    #[must_use]
    pub fn new(
        method_name: impl Into<String>,
        spec: Arc<OperationSpec>,
        authorization: Option<Arc<Authorization>>,
        base_url: Option<String>,
        interceptor: Arc<Interceptor>,
    ) -> Self {
        Self {
            method_name: method_name.into(),
            spec,
            authorization,
            base_url,
            interceptor,
        }
    }

    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    #[must_use]
    pub fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    #[must_use]
    pub fn authorization(&self) -> Option<&Authorization> {
        self.authorization.as_deref()
    }

    /// Build the outgoing request without running it.
    ///
    /// # Errors
    /// Returns [`ConnectorError::MissingBaseUrl`] when no base URL is known and
    /// [`ConnectorError::Parameter`] when parameters do not fit the operation.
    pub fn request(
        &self,
        params: &Map<String, Value>,
        options: &CallOptions,
    ) -> Result<RequestContext, ConnectorError> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| ConnectorError::MissingBaseUrl(self.method_name.clone()))?;
        build_request(base_url, &self.spec, params, options)
    }

    /// Invoke the operation and await its outcome.
    ///
    /// # Errors
    /// Any failure of request building or of the pipeline stages.
    pub async fn call(
        &self,
        params: &Map<String, Value>,
        options: &CallOptions,
    ) -> Result<ApiResponse, ConnectorError> {
        let req = self.request(params, options)?;
        tracing::debug!(operation = %self.method_name, method = %req.method, url = %req.url, "invoking operation");
        self.interceptor.run(req, self.authorization.as_deref()).await
    }

    /// Owned invocation future, independent of the borrow of `self`.
    #[must_use]
    pub fn future(self: &Arc<Self>, params: Map<String, Value>, options: CallOptions) -> InvocationFuture {
        let op = Arc::clone(self);
        Box::pin(async move { op.call(&params, &options).await })
    }

    /// Callback-style invocation: runs on the runtime, `callback` receives the
    /// outcome exactly once.
    #[must_use]
    pub fn call_with(
        self: &Arc<Self>,
        params: Map<String, Value>,
        options: CallOptions,
        callback: Callback,
    ) -> Invocation {
        dispatch(self.future(params, options), Some(callback))
    }

    /// Invoke in the style selected by the presence of a trailing callback.
    #[must_use]
    pub fn invoke(
        self: &Arc<Self>,
        params: Map<String, Value>,
        options: CallOptions,
        callback: Option<Callback>,
    ) -> Invocation {
        dispatch(self.future(params, options), callback)
    }
}

/// Operations in exposure order, addressable by method name or operationId.
#[derive(Debug, Default)]
pub struct OperationTable {
    operations: Vec<Arc<Operation>>,
    by_name: HashMap<String, usize>,
    by_operation_id: HashMap<String, usize>,
}

impl OperationTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is already exposed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Add an operation under its method name. A later operation with the
    /// same method name replaces the earlier one.
    pub fn insert(&mut self, operation: Operation) -> Arc<Operation> {
        let operation = Arc::new(operation);
        let index = match self.by_name.get(operation.method_name()) {
            Some(&index) => {
                tracing::warn!(method = %operation.method_name(), "operation method name exposed twice, replacing");
                self.operations[index] = Arc::clone(&operation);
                index
            }
            None => {
                self.operations.push(Arc::clone(&operation));
                let index = self.operations.len() - 1;
                self.by_name.insert(operation.method_name().to_owned(), index);
                index
            }
        };
        if let Some(id) = &operation.spec().operation_id {
            self.by_operation_id.insert(id.clone(), index);
        }
        operation
    }

    /// Look up by exposed method name first, then by operationId.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Arc<Operation>> {
        self.by_name
            .get(name)
            .or_else(|| self.by_operation_id.get(name))
            .and_then(|&index| self.operations.get(index))
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.method_name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Operation>> {
        self.operations.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::auth::CredentialLocation;
    use crate::hooks::ObserverRegistry;
    use crate::invoke::callback;
    use crate::spec::{ParamLocation, ParameterSpec};
    use crate::test_support::MockTransport;
    use http::Method;
    use serde_json::json;
    use tokio::sync::oneshot;

    fn op_spec(name: &str, operation_id: Option<&str>) -> OperationSpec {
        OperationSpec {
            api_group: "pet".to_owned(),
            name: name.to_owned(),
            operation_id: operation_id.map(str::to_owned),
            method: Method::GET,
            path: "/pet/{petId}".to_owned(),
            parameters: vec![ParameterSpec {
                name: "petId".to_owned(),
                location: ParamLocation::Path,
                required: true,
            }],
            security: None,
            consumes: None,
        }
    }

    fn operation(
        name: &str,
        base_url: Option<&str>,
        authorization: Option<Authorization>,
    ) -> (Arc<Operation>, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::default());
        let interceptor = Arc::new(Interceptor::new(
            "swagger-connector/test",
            Arc::new(ObserverRegistry::new()),
            None,
            transport.clone(),
        ));
        let op = Operation::new(
            name,
            Arc::new(op_spec(name, Some("getPetById"))),
            authorization.map(Arc::new),
            base_url.map(str::to_owned),
            interceptor,
        );
        (Arc::new(op), transport)
    }

    fn params(value: &Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_method_name_collision() {
        let reserved = ["find", "create"];
        let taken = |name: &str| reserved.contains(&name);

        assert_eq!(method_name("pet", "getPetById", taken), "getPetById");
        assert_eq!(method_name("pet", "find", taken), "pet_find");
    }

    #[test]
    fn test_table_lookup_by_name_and_operation_id() {
        let (renamed, _) = operation("pet_getPetById", Some("http://h"), None);
        let mut table = OperationTable::new();
        table.insert(Arc::into_inner(renamed).unwrap());

        assert!(table.contains("pet_getPetById"));
        assert!(table.find("pet_getPetById").is_some());
        assert_eq!(
            table.find("getPetById").map(|op| op.method_name()),
            Some("pet_getPetById")
        );
        assert!(table.find("missing").is_none());
        assert_eq!(table.names(), vec!["pet_getPetById"]);
    }

    #[test]
    fn test_table_keeps_insertion_order() {
        let mut table = OperationTable::new();
        for name in ["b", "a", "c"] {
            let (op, _) = operation(name, None, None);
            table.insert(Arc::into_inner(op).unwrap());
        }
        assert_eq!(table.names(), vec!["b", "a", "c"]);
        assert_eq!(table.len(), 3);
    }

    #[tokio::test]
    async fn test_call_builds_request_and_applies_authorization() {
        let (op, transport) = operation(
            "getPetById",
            Some("http://petstore.local/v2/"),
            Some(Authorization::api_key("api_key", "abc12", CredentialLocation::Query)),
        );

        let res = op
            .call(&params(&json!({"petId": 7})), &CallOptions::default())
            .await
            .unwrap();

        assert!(res.is_success());
        let sent = transport.requests();
        assert_eq!(sent[0].url, "http://petstore.local/v2/pet/7?api_key=abc12");
    }

    #[tokio::test]
    async fn test_missing_base_url() {
        let (op, transport) = operation("getPetById", None, None);
        let err = op
            .call(&params(&json!({"petId": 7})), &CallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectorError::MissingBaseUrl(name) if name == "getPetById"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_invoke_future_style() {
        let (op, _) = operation("getPetById", Some("http://h"), None);
        let outcome = op
            .invoke(params(&json!({"petId": 1})), CallOptions::default(), None)
            .settle()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.obj().unwrap()["url"], "http://h/pet/1");
    }

    #[tokio::test]
    async fn test_call_with_callback() {
        let (op, _) = operation("getPetById", Some("http://h"), None);
        let (tx, rx) = oneshot::channel();

        op.call_with(
            Map::new(),
            CallOptions::default(),
            callback(move |result| {
                tx.send(result).unwrap();
            }),
        )
        .settle()
        .await;

        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(err, ConnectorError::Parameter { name, .. } if name == "petId"));
    }
}
