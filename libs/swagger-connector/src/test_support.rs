//! In-process doubles shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use parking_lot::Mutex;
use serde_json::json;

use crate::error::TransportError;
use crate::headers::Headers;
use crate::request::RequestContext;
use crate::response::ApiResponse;
use crate::transport::Transport;

type Handler = Box<dyn Fn(&RequestContext, usize) -> Result<ApiResponse, TransportError> + Send + Sync>;

/// Records every request. By default answers `200` with
/// `{"url": <url>, "call": <n>}` so fresh responses differ from each other.
pub struct MockTransport {
    handler: Mutex<Handler>,
    requests: Mutex<Vec<RequestContext>>,
    calls: AtomicUsize,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            handler: Mutex::new(Box::new(|req, n| {
                Ok(json_response(&req.url, 200, &json!({"url": req.url, "call": n})))
            })),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }
}

pub fn json_response(url: &str, status: u16, body: &serde_json::Value) -> ApiResponse {
    ApiResponse::new(
        url,
        StatusCode::from_u16(status).unwrap(),
        [("content-type", "application/json")].into_iter().collect(),
        Bytes::from(serde_json::to_vec(body).unwrap()),
    )
}

impl MockTransport {
    /// Answer every request with a fixed status and text body.
    pub fn respond_with(&self, status: u16, body: &'static str) {
        *self.handler.lock() = Box::new(move |req, _| {
            Ok(ApiResponse::new(
                req.url.clone(),
                StatusCode::from_u16(status).unwrap(),
                Headers::new(),
                Bytes::from_static(body.as_bytes()),
            ))
        });
    }

    pub fn fail_with(&self, message: &'static str) {
        *self.handler.lock() =
            Box::new(move |_, _| Err(TransportError::Transport(message.into())));
    }

    pub fn requests(&self) -> Vec<RequestContext> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: RequestContext) -> Result<ApiResponse, TransportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let result = (self.handler.lock())(&request, n);
        self.requests.lock().push(request);
        result
    }
}
