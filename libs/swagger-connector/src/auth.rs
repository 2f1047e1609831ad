//! Credential strategies applied to outgoing requests.
//!
//! A strategy is chosen once per operation at connect time. Applying it never
//! fails and never replaces a non-empty credential the caller already set; the
//! returned flag reports whether the request was modified.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::request::RequestContext;
use crate::spec::{SecurityRequirements, SecurityScheme};

const ACCESS_TOKEN: &str = "access_token";
const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Where a key or token travels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialLocation {
    Query,
    #[default]
    Header,
}

fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

/// The `security` connector setting.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum SecurityConfig {
    #[serde(rename = "basic")]
    Basic {
        username: String,
        #[serde(deserialize_with = "secret")]
        password: SecretString,
    },
    #[serde(rename = "apiKey")]
    ApiKey {
        name: String,
        #[serde(deserialize_with = "secret")]
        key: SecretString,
        #[serde(default, rename = "in")]
        location: CredentialLocation,
    },
    #[serde(rename = "oauth2")]
    OAuth2 {
        #[serde(default)]
        name: Option<String>,
        #[serde(alias = "access_token", deserialize_with = "secret")]
        access_token: SecretString,
        #[serde(default, rename = "in")]
        location: CredentialLocation,
        #[serde(default, alias = "token_type")]
        token_type: Option<String>,
    },
}

#[derive(Debug)]
pub struct BasicAuth {
    username: String,
    password: SecretString,
}

#[derive(Debug)]
pub struct ApiKeyAuth {
    name: String,
    key: SecretString,
    location: CredentialLocation,
}

/// Bearer-style access token.
#[derive(Debug)]
pub struct AccessTokenAuth {
    token: SecretString,
    location: CredentialLocation,
    token_type: String,
}

impl AccessTokenAuth {
    #[must_use]
    pub fn new(token: impl Into<String>, location: CredentialLocation) -> Self {
        Self {
            token: SecretString::from(token.into()),
            location,
            token_type: DEFAULT_TOKEN_TYPE.to_owned(),
        }
    }

    #[must_use]
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    fn apply(&self, req: &mut RequestContext) -> bool {
        let token = self.token.expose_secret();
        match self.location {
            CredentialLocation::Query => {
                if req.has_query_param(ACCESS_TOKEN) {
                    return false;
                }
                req.push_query_pair(&format!("{ACCESS_TOKEN}={token}"));
                true
            }
            CredentialLocation::Header => {
                let value = format!("{} {token}", self.token_type);
                match req.headers.get("authorization") {
                    Some(existing) if !existing.is_empty() => false,
                    _ => {
                        req.headers.insert("Authorization", value);
                        true
                    }
                }
            }
        }
    }
}

/// Credential strategy bound to an operation.
#[derive(Debug)]
pub enum Authorization {
    Basic(BasicAuth),
    ApiKey(ApiKeyAuth),
    OAuth2(AccessTokenAuth),
}

impl Authorization {
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Authorization::Basic(BasicAuth {
            username: username.into(),
            password: SecretString::from(password.into()),
        })
    }

    #[must_use]
    pub fn api_key(
        name: impl Into<String>,
        key: impl Into<String>,
        location: CredentialLocation,
    ) -> Self {
        Authorization::ApiKey(ApiKeyAuth {
            name: name.into(),
            key: SecretString::from(key.into()),
            location,
        })
    }

    #[must_use]
    pub fn access_token(token: impl Into<String>, location: CredentialLocation) -> Self {
        Authorization::OAuth2(AccessTokenAuth::new(token, location))
    }

    /// Attach the credential; `false` when the request already carried one.
    pub fn apply(&self, req: &mut RequestContext) -> bool {
        match self {
            Authorization::Basic(basic) => {
                if req
                    .headers
                    .get("authorization")
                    .is_some_and(|v| !v.is_empty())
                {
                    return false;
                }
                let raw = format!("{}:{}", basic.username, basic.password.expose_secret());
                req.headers
                    .insert("Authorization", format!("Basic {}", STANDARD.encode(raw)));
                true
            }
            Authorization::ApiKey(api_key) => match api_key.location {
                CredentialLocation::Query => {
                    if req.has_query_param(&api_key.name) {
                        return false;
                    }
                    req.append_query_param(&api_key.name, api_key.key.expose_secret());
                    true
                }
                CredentialLocation::Header => {
                    if req.headers.contains(&api_key.name) {
                        return false;
                    }
                    req.headers
                        .insert(api_key.name.clone(), api_key.key.expose_secret());
                    true
                }
            },
            Authorization::OAuth2(token) => token.apply(req),
        }
    }
}

impl From<SecurityConfig> for Authorization {
    fn from(config: SecurityConfig) -> Self {
        match config {
            SecurityConfig::Basic { username, password } => {
                Authorization::Basic(BasicAuth { username, password })
            }
            SecurityConfig::ApiKey {
                name,
                key,
                location,
            } => Authorization::ApiKey(ApiKeyAuth {
                name,
                key,
                location,
            }),
            SecurityConfig::OAuth2 {
                access_token,
                location,
                token_type,
                ..
            } => Authorization::OAuth2(AccessTokenAuth {
                token: access_token,
                location,
                token_type: token_type.unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_owned()),
            }),
        }
    }
}

fn invalid(scheme: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidSecurity(format!("authorization `{scheme}`: {reason}"))
}

fn string_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str)
}

/// Token value from `"tok"`, `{"token": "tok"}` or
/// `{"token": {"access_token": "tok", "token_type": "JWT"}}`.
fn token_credential(value: &Value) -> Option<(String, Option<String>)> {
    match value {
        Value::String(token) => Some((token.clone(), None)),
        Value::Object(_) => {
            let token = value.get("token").unwrap_or(value);
            if let Some(raw) = token.as_str() {
                return Some((raw.to_owned(), None));
            }
            let access = string_field(token, "access_token")
                .or_else(|| string_field(token, "accessToken"))?;
            let kind = string_field(token, "token_type").or_else(|| string_field(token, "tokenType"));
            Some((access.to_owned(), kind.map(str::to_owned)))
        }
        _ => None,
    }
}

/// Build the strategy for one declared scheme from user-supplied credentials.
///
/// # Errors
/// Returns [`ConfigError::InvalidSecurity`] when the credential shape does not
/// match the scheme, or the scheme cannot be attached.
pub fn authorization_for_scheme(
    scheme_name: &str,
    scheme: &SecurityScheme,
    credential: &Value,
) -> Result<Authorization, ConfigError> {
    match scheme {
        SecurityScheme::Basic => {
            let username = string_field(credential, "username")
                .ok_or_else(|| invalid(scheme_name, "expected `username` and `password`"))?;
            let password = string_field(credential, "password").unwrap_or_default();
            Ok(Authorization::basic(username, password))
        }
        SecurityScheme::ApiKey { name, location } => {
            let key = credential
                .as_str()
                .or_else(|| string_field(credential, "key"))
                .ok_or_else(|| invalid(scheme_name, "expected an api key string"))?;
            Ok(Authorization::api_key(name.clone(), key, *location))
        }
        SecurityScheme::OAuth2 | SecurityScheme::Bearer => {
            let (token, token_type) = token_credential(credential)
                .ok_or_else(|| invalid(scheme_name, "expected an access token"))?;
            let auth = AccessTokenAuth::new(token, CredentialLocation::Header);
            Ok(Authorization::OAuth2(match token_type {
                Some(kind) => auth.with_token_type(kind),
                None => auth,
            }))
        }
        SecurityScheme::Unsupported(kind) => Err(invalid(
            scheme_name,
            &format!("scheme type `{kind}` is not supported"),
        )),
    }
}

/// Strategies for every scheme present in the `authorizations` setting.
///
/// Entries naming schemes the document does not declare are skipped with a warning.
///
/// # Errors
/// See [`authorization_for_scheme`].
pub fn resolve_authorizations<S: std::hash::BuildHasher>(
    schemes: &HashMap<String, SecurityScheme, S>,
    credentials: &Map<String, Value>,
) -> Result<HashMap<String, Arc<Authorization>>, ConfigError> {
    let mut resolved = HashMap::with_capacity(credentials.len());
    for (name, credential) in credentials {
        let Some(scheme) = schemes.get(name) else {
            tracing::warn!(scheme = %name, "authorization supplied for an undeclared security scheme");
            continue;
        };
        let auth = authorization_for_scheme(name, scheme, credential)?;
        resolved.insert(name.clone(), Arc::new(auth));
    }
    Ok(resolved)
}

/// First configured scheme of the requirement alternatives, in document order.
#[must_use]
pub fn select_authorization<'a, S: std::hash::BuildHasher>(
    requirements: &SecurityRequirements,
    available: &'a HashMap<String, Arc<Authorization>, S>,
) -> Option<&'a Arc<Authorization>> {
    requirements
        .iter()
        .flatten()
        .find_map(|scheme| available.get(scheme))
}
