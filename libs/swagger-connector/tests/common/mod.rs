#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;
use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::{Map, Value, json};
use swagger_connector::{
    Connector, ConnectorSettings, MemoryStore, NamedStores, StoreRegistry,
};

/// Absolute path of a file under `tests/fixtures`.
pub fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
        .display()
        .to_string()
}

pub fn params(value: &Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// Echo service document: no host, so the base URL comes from where it is served.
pub fn echo_spec() -> Value {
    json!({
        "swagger": "2.0",
        "info": { "title": "Echo", "version": "1.0.0" },
        "produces": ["application/json"],
        "paths": {
            "/echo": {
                "get": {
                    "operationId": "echo",
                    "parameters": [
                        { "name": "message", "in": "query", "type": "string" },
                        { "name": "accept-language", "in": "header", "type": "string" }
                    ],
                    "responses": { "200": { "description": "echoed message" } }
                }
            },
            "/uids": {
                "post": {
                    "operationId": "createId",
                    "responses": { "200": { "description": "fresh id" } }
                }
            }
        }
    })
}

/// Serve `spec` at `/swagger` and return the URL to load it from.
pub fn serve_spec(server: &MockServer, spec: &Value) -> String {
    let body = spec.clone();
    server.mock(|when, then| {
        when.method(GET).path("/swagger");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(body);
    });
    server.url("/swagger")
}

/// Registry with one in-memory store under `name`.
pub fn memory_registry(name: &str) -> Arc<dyn StoreRegistry> {
    Arc::new(NamedStores::new().with_store(name, Arc::new(MemoryStore::default())))
}

pub fn settings(value: Value) -> ConnectorSettings {
    match serde_json::from_value(value) {
        Ok(settings) => settings,
        Err(e) => panic!("invalid connector settings: {e}"),
    }
}

pub fn connector(value: Value) -> Connector {
    match Connector::new(settings(value)) {
        Ok(connector) => connector,
        Err(e) => panic!("connector settings rejected: {e}"),
    }
}
