use std::path::{Path, PathBuf};

use serde_json::Value;
use url::Url;

use crate::error::SpecError;
use crate::request::RequestContext;
use crate::transport::Transport;

/// Where a specification comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecSource {
    /// In-memory document, used unchanged
    Document(Value),
    /// Remote document fetched through the transport
    Url(Url),
    /// Local `.json` / `.yaml` / `.yml` file
    Path(PathBuf),
}

impl SpecSource {
    /// Classify the `spec` setting.
    ///
    /// Strings that parse as a URL with a host are remote sources; every other
    /// string is a file path.
    ///
    /// # Errors
    /// Returns [`SpecError::InvalidSpecType`] for values that are neither an
    /// object nor a string.
    pub fn classify(value: &Value) -> Result<Self, SpecError> {
        match value {
            Value::Object(_) => Ok(SpecSource::Document(value.clone())),
            Value::String(s) => match Url::parse(s) {
                Ok(url) if url.has_host() && matches!(url.scheme(), "http" | "https") => {
                    Ok(SpecSource::Url(url))
                }
                _ => Ok(SpecSource::Path(PathBuf::from(s))),
            },
            other => Err(SpecError::InvalidSpecType {
                found: json_type(other),
            }),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Raw document plus the URL it was loaded from.
#[derive(Debug, Clone)]
pub struct ResolvedSpec {
    pub document: Value,
    pub source_url: Option<Url>,
}

enum Format {
    Json,
    Yaml,
}

fn format_of(path: &Path) -> Result<Format, SpecError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("yaml" | "yml") => Ok(Format::Yaml),
        _ => Err(SpecError::InvalidFileType {
            path: path.display().to_string(),
        }),
    }
}

fn parse_yaml(text: &str) -> Result<Value, SpecError> {
    serde_saphyr::from_str(text).map_err(|e| SpecError::Yaml(e.to_string()))
}

/// Turn a spec source into a raw document.
///
/// Relative paths resolve against the current directory. Remote documents are
/// parsed as JSON first, then as YAML.
///
/// # Errors
/// Returns a [`SpecError`] when the file type is unsupported, the document
/// cannot be read or fetched, or it does not parse.
pub async fn resolve_spec(
    source: &SpecSource,
    transport: &dyn Transport,
) -> Result<ResolvedSpec, SpecError> {
    match source {
        SpecSource::Document(document) => Ok(ResolvedSpec {
            document: document.clone(),
            source_url: None,
        }),
        SpecSource::Path(path) => {
            let format = format_of(path)?;
            let full = if path.is_absolute() {
                path.clone()
            } else {
                std::env::current_dir()
                    .map_err(|source| SpecError::Io {
                        path: path.display().to_string(),
                        source,
                    })?
                    .join(path)
            };
            tracing::debug!(path = %full.display(), "reading specification file");
            let text = tokio::fs::read_to_string(&full)
                .await
                .map_err(|source| SpecError::Io {
                    path: full.display().to_string(),
                    source,
                })?;
            let document = match format {
                Format::Json => serde_json::from_str(&text)?,
                Format::Yaml => parse_yaml(&text)?,
            };
            Ok(ResolvedSpec {
                document,
                source_url: None,
            })
        }
        SpecSource::Url(url) => {
            tracing::debug!(url = %url, "fetching specification");
            let mut request = RequestContext::get(url.as_str());
            request
                .headers
                .insert("Accept", "application/json, application/yaml;q=0.9, */*;q=0.8");
            let response = transport
                .execute(request)
                .await
                .map_err(|e| SpecError::Fetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            if !response.is_success() {
                return Err(SpecError::Fetch {
                    url: url.to_string(),
                    reason: format!("HTTP {}", response.status),
                });
            }
            let document = match serde_json::from_slice(&response.body) {
                Ok(document) => document,
                Err(_) => parse_yaml(&response.text())?,
            };
            Ok(ResolvedSpec {
                document,
                source_url: Some(url.clone()),
            })
        }
    }
}
