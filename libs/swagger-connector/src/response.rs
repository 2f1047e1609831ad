use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::headers::Headers;

/// Fully buffered HTTP response.
///
/// Cached entries are clones of this value, so a cache hit is structurally
/// identical to the response that populated it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub url: String,
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Bytes,
}

impl ApiResponse {
    #[must_use]
    pub fn new(url: impl Into<String>, status: StatusCode, headers: Headers, body: Bytes) -> Self {
        Self {
            url: url.into(),
            status,
            headers,
            body,
        }
    }

    /// Body decoded as JSON, `None` when empty or not valid JSON.
    #[must_use]
    pub fn obj(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    /// Deserialize the body into `T`.
    ///
    /// # Errors
    /// Returns the JSON error when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as text, lossy for non-UTF-8 content.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.as_u16() < 400
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn response(status: u16, body: &'static str) -> ApiResponse {
        ApiResponse::new(
            "http://localhost/pets",
            StatusCode::from_u16(status).unwrap(),
            [("Content-Type", "application/json")].into_iter().collect(),
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[test]
    fn test_obj_decodes_json() {
        let res = response(200, r#"{"id":1,"name":"rex"}"#);
        assert_eq!(res.obj(), Some(json!({"id": 1, "name": "rex"})));
        assert_eq!(res.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_obj_is_none_for_non_json() {
        assert_eq!(response(200, "").obj(), None);
        assert_eq!(response(200, "plain text").obj(), None);
        assert_eq!(response(200, "plain text").text(), "plain text");
    }

    #[test]
    fn test_json_into_struct() {
        #[derive(Deserialize)]
        struct Pet {
            name: String,
        }
        let pet: Pet = response(200, r#"{"name":"rex"}"#).json().unwrap();
        assert_eq!(pet.name, "rex");
    }

    #[test]
    fn test_success_boundary() {
        assert!(response(204, "").is_success());
        assert!(response(399, "").is_success());
        assert!(!response(400, "").is_success());
        assert!(!response(503, "").is_success());
    }
}
