use std::collections::HashMap;
use std::fmt;

use http::Method;
use serde_json::{Map, Value};
use url::Url;

use crate::auth::CredentialLocation;
use crate::error::SpecError;

pub const METHODS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Document dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecVersion {
    Swagger2,
    OpenApi3,
}

impl SpecVersion {
    /// Detect the dialect from the `swagger` / `openapi` version marker.
    #[must_use]
    pub fn detect(document: &Value) -> Option<Self> {
        if document.get("swagger").and_then(Value::as_str) == Some("2.0") {
            return Some(SpecVersion::Swagger2);
        }
        document
            .get("openapi")
            .and_then(Value::as_str)
            .filter(|v| v.starts_with("3."))
            .map(|_| SpecVersion::OpenApi3)
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecVersion::Swagger2 => f.write_str("swagger 2.0"),
            SpecVersion::OpenApi3 => f.write_str("openapi 3"),
        }
    }
}

/// Where a declared parameter travels in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
    FormData,
}

impl ParamLocation {
    fn from_in(value: &str) -> Option<Self> {
        match value {
            "path" => Some(ParamLocation::Path),
            "query" => Some(ParamLocation::Query),
            "header" => Some(ParamLocation::Header),
            "cookie" => Some(ParamLocation::Cookie),
            "body" => Some(ParamLocation::Body),
            "formData" => Some(ParamLocation::FormData),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
}

/// Security scheme declared by the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityScheme {
    /// Swagger 2 `basic` or OpenAPI 3 `http` + `basic`
    Basic,
    /// OpenAPI 3 `http` + `bearer`
    Bearer,
    ApiKey {
        name: String,
        location: CredentialLocation,
    },
    OAuth2,
    /// Anything the connector cannot attach (cookie api keys, openIdConnect, ...)
    Unsupported(String),
}

impl SecurityScheme {
    fn parse(definition: &Value) -> Self {
        let kind = definition.get("type").and_then(Value::as_str).unwrap_or("");
        match kind {
            "basic" => SecurityScheme::Basic,
            "http" => match definition
                .get("scheme")
                .and_then(Value::as_str)
                .map(str::to_ascii_lowercase)
                .as_deref()
            {
                Some("basic") => SecurityScheme::Basic,
                Some("bearer") => SecurityScheme::Bearer,
                other => SecurityScheme::Unsupported(format!("http {}", other.unwrap_or("?"))),
            },
            "apiKey" => {
                let name = definition
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                match definition.get("in").and_then(Value::as_str) {
                    Some("query") => SecurityScheme::ApiKey {
                        name,
                        location: CredentialLocation::Query,
                    },
                    Some("header") => SecurityScheme::ApiKey {
                        name,
                        location: CredentialLocation::Header,
                    },
                    other => {
                        SecurityScheme::Unsupported(format!("apiKey in {}", other.unwrap_or("?")))
                    }
                }
            }
            "oauth2" => SecurityScheme::OAuth2,
            other => SecurityScheme::Unsupported(other.to_owned()),
        }
    }
}

/// Security requirement alternatives; each inner list names schemes that apply together.
pub type SecurityRequirements = Vec<Vec<String>>;

/// One HTTP operation declared by the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSpec {
    /// First tag, or `default`
    pub api_group: String,
    /// Natural method name derived from operationId or method + path
    pub name: String,
    pub operation_id: Option<String>,
    pub method: Method,
    /// Path template relative to the base URL, e.g. `/pet/{petId}`
    pub path: String,
    pub parameters: Vec<ParameterSpec>,
    /// Operation-level requirements; `None` inherits the document's global ones
    pub security: Option<SecurityRequirements>,
    /// Media type used for request bodies
    pub consumes: Option<String>,
}

/// Resolved document with its operations extracted.
#[derive(Debug, Clone)]
pub struct Specification {
    pub document: Value,
    pub version: SpecVersion,
    /// Base URL declared by the document, completed with the load origin when relative
    pub base_url: Option<String>,
    pub operations: Vec<OperationSpec>,
    pub security_schemes: HashMap<String, SecurityScheme>,
    pub global_security: SecurityRequirements,
}

impl Specification {
    /// Extract operations and metadata from a document.
    ///
    /// `origin` is the URL the document was fetched from, if any.
    ///
    /// # Errors
    /// Returns [`SpecError::Unsupported`] when the version marker or `paths`
    /// object is missing.
    pub fn from_document(document: Value, origin: Option<&Url>) -> Result<Self, SpecError> {
        let version = SpecVersion::detect(&document).ok_or_else(|| {
            SpecError::Unsupported("expected `swagger: \"2.0\"` or `openapi: 3.x`".to_owned())
        })?;
        let paths = document
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| SpecError::Unsupported("missing `paths` object".to_owned()))?;

        let global_consumes = first_media_type(document.get("consumes"));
        let mut operations = Vec::new();
        for (path, item) in paths {
            let item = resolve_ref(&document, item);
            let shared = parameters_of(&document, item.get("parameters"));
            for method in METHODS {
                let Some(op) = item.get(method).and_then(Value::as_object) else {
                    continue;
                };
                operations.push(build_operation(
                    &document,
                    version,
                    path,
                    method,
                    op,
                    &shared,
                    global_consumes.as_deref(),
                ));
            }
        }

        let base_url = base_url(&document, version, origin);
        let security_schemes = security_schemes(&document, version);
        let global_security = document
            .get("security")
            .map(requirements)
            .unwrap_or_default();

        Ok(Self {
            document,
            version,
            base_url,
            operations,
            security_schemes,
            global_security,
        })
    }

    /// Effective requirements for `op`.
    #[must_use]
    pub fn security_for<'a>(&'a self, op: &'a OperationSpec) -> &'a SecurityRequirements {
        op.security.as_ref().unwrap_or(&self.global_security)
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.document.pointer("/info/title").and_then(Value::as_str)
    }
}

/// Follow a local `$ref` (`#/...`) once; other values are returned as is.
#[must_use]
pub fn resolve_ref<'a>(document: &'a Value, value: &'a Value) -> &'a Value {
    value
        .get("$ref")
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix('#'))
        .and_then(|pointer| document.pointer(pointer))
        .unwrap_or(value)
}

/// Replace every non-word character with `_`.
#[must_use]
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn parameters_of(document: &Value, list: Option<&Value>) -> Vec<ParameterSpec> {
    list.and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|raw| {
            let param = resolve_ref(document, raw);
            let name = param.get("name")?.as_str()?.to_owned();
            let location = ParamLocation::from_in(param.get("in")?.as_str()?)?;
            let required = location == ParamLocation::Path
                || param.get("required").and_then(Value::as_bool).unwrap_or(false);
            Some(ParameterSpec {
                name,
                location,
                required,
            })
        })
        .collect()
}

fn first_media_type(list: Option<&Value>) -> Option<String> {
    let types: Vec<&str> = list
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .collect();
    types
        .iter()
        .find(|t| t.contains("json"))
        .or_else(|| types.first())
        .map(|t| (*t).to_owned())
}

fn requirements(value: &Value) -> SecurityRequirements {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .map(|alternative| alternative.keys().cloned().collect())
        .collect()
}

fn build_operation(
    document: &Value,
    version: SpecVersion,
    path: &str,
    method: &str,
    op: &Map<String, Value>,
    shared: &[ParameterSpec],
    global_consumes: Option<&str>,
) -> OperationSpec {
    let own = parameters_of(document, op.get("parameters"));
    let mut parameters: Vec<ParameterSpec> = shared
        .iter()
        .filter(|p| {
            !own.iter()
                .any(|o| o.name == p.name && o.location == p.location)
        })
        .cloned()
        .collect();
    parameters.extend(own);

    let mut consumes = match version {
        SpecVersion::Swagger2 => {
            first_media_type(op.get("consumes")).or_else(|| global_consumes.map(str::to_owned))
        }
        SpecVersion::OpenApi3 => None,
    };

    if let Some(body) = op.get("requestBody").map(|b| resolve_ref(document, b)) {
        let content = body.get("content").and_then(Value::as_object);
        consumes = content.and_then(|c| {
            c.keys()
                .find(|k| k.contains("json"))
                .or_else(|| c.keys().next())
                .cloned()
        });
        parameters.push(ParameterSpec {
            name: "body".to_owned(),
            location: ParamLocation::Body,
            required: body.get("required").and_then(Value::as_bool).unwrap_or(false),
        });
    }

    let operation_id = op
        .get("operationId")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let name = match &operation_id {
        Some(id) => sanitize(id),
        None => format!("{method}{}", sanitize(path)),
    };
    let api_group = op
        .get("tags")
        .and_then(Value::as_array)
        .and_then(|tags| tags.first())
        .and_then(Value::as_str)
        .map_or_else(|| "default".to_owned(), sanitize);

    OperationSpec {
        api_group,
        name,
        operation_id,
        method: Method::from_bytes(method.to_ascii_uppercase().as_bytes()).unwrap_or(Method::GET),
        path: path.to_owned(),
        parameters,
        security: op.get("security").map(requirements),
        consumes,
    }
}

fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

fn base_url(document: &Value, version: SpecVersion, origin: Option<&Url>) -> Option<String> {
    match version {
        SpecVersion::Swagger2 => {
            let base_path = document
                .get("basePath")
                .and_then(Value::as_str)
                .unwrap_or("");
            if let Some(host) = document.get("host").and_then(Value::as_str) {
                let scheme = document
                    .get("schemes")
                    .and_then(Value::as_array)
                    .and_then(|s| s.first())
                    .and_then(Value::as_str)
                    .or_else(|| origin.map(Url::scheme))
                    .unwrap_or("http");
                Some(format!("{scheme}://{host}{base_path}"))
            } else {
                origin.map(|o| format!("{}{base_path}", origin_of(o)))
            }
        }
        SpecVersion::OpenApi3 => {
            let server = document.pointer("/servers/0");
            let Some(raw) = server.and_then(|s| s.get("url")).and_then(Value::as_str) else {
                return origin.map(origin_of);
            };
            let expanded = expand_server_variables(raw, server.and_then(|s| s.get("variables")));
            if Url::parse(&expanded).is_ok_and(|u| u.has_host()) {
                Some(expanded)
            } else {
                origin.and_then(|o| o.join(&expanded).ok()).map(String::from)
            }
        }
    }
}

fn expand_server_variables(url: &str, variables: Option<&Value>) -> String {
    let Some(variables) = variables.and_then(Value::as_object) else {
        return url.to_owned();
    };
    variables.iter().fold(url.to_owned(), |acc, (name, var)| {
        match var.get("default").and_then(Value::as_str) {
            Some(default) => acc.replace(&format!("{{{name}}}"), default),
            None => acc,
        }
    })
}

fn security_schemes(document: &Value, version: SpecVersion) -> HashMap<String, SecurityScheme> {
    let pointer = match version {
        SpecVersion::Swagger2 => "/securityDefinitions",
        SpecVersion::OpenApi3 => "/components/securitySchemes",
    };
    document
        .pointer(pointer)
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .map(|(name, definition)| {
            let definition = resolve_ref(document, definition);
            (name.clone(), SecurityScheme::parse(definition))
        })
        .collect()
}
