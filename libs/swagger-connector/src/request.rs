use bytes::Bytes;
use http::Method;
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::error::ConnectorError;
use crate::headers::Headers;
use crate::spec::{OperationSpec, ParamLocation};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Outgoing request as seen by authorization strategies, observers and the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
}

impl RequestContext {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Query string without the leading `?`, `None` when the URL has none.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        let target = &self.url[..self.fragment_start()];
        let start = target.find('?')? + 1;
        Some(&target[start..])
    }

    /// Byte offset of the `#` fragment marker, or the URL length.
    fn fragment_start(&self) -> usize {
        self.url.find('#').unwrap_or(self.url.len())
    }

    /// Whether the query string carries a parameter named `name`.
    #[must_use]
    pub fn has_query_param(&self, name: &str) -> bool {
        self.query().is_some_and(|query| {
            form_urlencoded::parse(query.as_bytes()).any(|(key, _)| key == name)
        })
    }

    /// Append an encoded `name=value` pair to the query string.
    pub fn append_query_param(&mut self, name: &str, value: &str) {
        let pair = form_urlencoded::Serializer::new(String::new())
            .append_pair(name, value)
            .finish();
        self.push_query_pair(&pair);
    }

    /// Append an already encoded `name=value` pair, choosing `?` or `&`.
    ///
    /// The pair goes at the end of the query, ahead of any `#fragment`.
    pub fn push_query_pair(&mut self, pair: &str) {
        let separator = match self.query() {
            None => "?",
            Some("") => "",
            Some(_) => "&",
        };
        let at = self.fragment_start();
        self.url.insert_str(at, &format!("{separator}{pair}"));
    }
}

/// Per-call options that sit next to the parameter object.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Request body; takes precedence over a declared `body` parameter.
    pub request_body: Option<Value>,
    /// Preferred response media type, sent as `Accept`.
    pub response_content_type: Option<String>,
    /// Extra headers, applied after parameter headers.
    pub headers: Headers,
}

impl CallOptions {
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.request_body = Some(body);
        self
    }

    #[must_use]
    pub fn with_response_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.response_content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }
}

fn param_error(name: &str, reason: impl Into<String>) -> ConnectorError {
    ConnectorError::Parameter {
        name: name.to_owned(),
        reason: reason.into(),
    }
}

/// Scalar rendering used for path, query, header and form values.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(scalar).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

fn expand_path(template: &str, params: &Map<String, Value>) -> Result<String, ConnectorError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| param_error(template, "unterminated path template"))?;
        let name = &after[..close];
        let value = params
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| param_error(name, "missing required path parameter"))?;
        out.push_str(&urlencoding::encode(&scalar(value)));
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Build the outgoing request for `op` from a parameter object.
///
/// Declared parameters are routed by location. Undeclared entries are ignored,
/// except that every `{name}` in the path template must be satisfied.
///
/// # Errors
/// Returns [`ConnectorError::Parameter`] when a required parameter is missing.
pub fn build_request(
    base_url: &str,
    op: &OperationSpec,
    params: &Map<String, Value>,
    options: &CallOptions,
) -> Result<RequestContext, ConnectorError> {
    let path = expand_path(&op.path, params)?;

    let mut query = form_urlencoded::Serializer::new(String::new());
    let mut has_query = false;
    let mut headers = Headers::new();
    let mut cookies = Vec::new();
    let mut form = form_urlencoded::Serializer::new(String::new());
    let mut has_form = false;
    let mut body = options.request_body.clone();

    for param in &op.parameters {
        let value = params.get(&param.name).filter(|v| !v.is_null());
        let Some(value) = value else {
            let satisfied_by_options =
                param.location == ParamLocation::Body && options.request_body.is_some();
            if param.required && !satisfied_by_options {
                return Err(param_error(&param.name, "missing required parameter"));
            }
            continue;
        };

        match param.location {
            // Already substituted into the path
            ParamLocation::Path => {}
            ParamLocation::Query => {
                has_query = true;
                match value {
                    Value::Array(items) => {
                        for item in items {
                            query.append_pair(&param.name, &scalar(item));
                        }
                    }
                    other => {
                        query.append_pair(&param.name, &scalar(other));
                    }
                }
            }
            ParamLocation::Header => {
                headers.insert(param.name.clone(), scalar(value));
            }
            ParamLocation::Cookie => {
                cookies.push(format!("{}={}", param.name, urlencoding::encode(&scalar(value))));
            }
            ParamLocation::Body => {
                if body.is_none() {
                    body = Some(value.clone());
                }
            }
            ParamLocation::FormData => {
                has_form = true;
                form.append_pair(&param.name, &scalar(value));
            }
        }
    }

    let mut url = join_url(base_url, &path);
    if has_query {
        url.push('?');
        url.push_str(&query.finish());
    }

    let mut ctx = RequestContext::new(op.method.clone(), url);
    ctx.headers = headers;
    if !cookies.is_empty() {
        ctx.headers.insert("Cookie", cookies.join("; "));
    }

    if let Some(body) = body {
        let content_type = op
            .consumes
            .clone()
            .unwrap_or_else(|| "application/json".to_owned());
        let bytes = match &body {
            Value::Object(fields) if content_type.starts_with(FORM_URLENCODED) => {
                let mut form = form_urlencoded::Serializer::new(String::new());
                for (name, value) in fields {
                    form.append_pair(name, &scalar(value));
                }
                Bytes::from(form.finish())
            }
            _ => serde_json::to_vec(&body)
                .map(Bytes::from)
                .map_err(|e| param_error("body", e.to_string()))?,
        };
        ctx.headers.insert("Content-Type", content_type);
        ctx.body = Some(bytes);
    } else if has_form {
        ctx.headers.insert("Content-Type", FORM_URLENCODED);
        ctx.body = Some(Bytes::from(form.finish()));
    }

    if let Some(accept) = &options.response_content_type {
        ctx.headers.insert("Accept", accept.clone());
    }
    ctx.headers.extend_from(&options.headers);

    Ok(ctx)
}
