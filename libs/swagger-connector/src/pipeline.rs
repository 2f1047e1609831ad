use std::sync::Arc;

use crate::auth::Authorization;
use crate::cache::{ResponseCache, cache_key};
use crate::error::ConnectorError;
use crate::hooks::{AfterExecute, BeforeExecute, HookContext, ObserverRegistry};
use crate::request::RequestContext;
use crate::response::ApiResponse;
use crate::transport::Transport;

/// Per-invocation request pipeline shared by every operation of a client.
///
/// Stage order for one call:
///
/// 1. stamp `User-Agent` and apply the operation's authorization
/// 2. `before execute` observers (a failure aborts the call)
/// 3. cache lookup for GET requests, a hit skips dispatch
/// 4. dispatch through the transport; 4xx/5xx become [`ConnectorError::HttpStatus`]
/// 5. `after execute` observers, on both the success and the failure branch
/// 6. cache write, only for a freshly dispatched success
pub struct Interceptor {
    user_agent: String,
    observers: Arc<ObserverRegistry>,
    cache: Option<Arc<ResponseCache>>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("user_agent", &self.user_agent)
            .field("observers", &self.observers)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Interceptor {
    #[must_use]
    pub fn new(
        user_agent: impl Into<String>,
        observers: Arc<ObserverRegistry>,
        cache: Option<Arc<ResponseCache>>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            observers,
            cache,
            transport,
        }
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn prepare(&self, req: &mut RequestContext, authorization: Option<&Authorization>) {
        if !req.headers.contains("user-agent") {
            req.headers.insert("User-Agent", self.user_agent.as_str());
        }
        if let Some(authorization) = authorization {
            let applied = authorization.apply(req);
            tracing::trace!(applied, "authorization applied");
        }
    }

    async fn dispatch(&self, req: RequestContext) -> Result<ApiResponse, ConnectorError> {
        let response = self.transport.execute(req).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ConnectorError::HttpStatus {
                response: Box::new(response),
            })
        }
    }

    /// Run one request through every stage and resolve it exactly once.
    ///
    /// # Errors
    /// Returns the first observer failure, a cache store failure, or the
    /// dispatch error left in place by `after execute` observers.
    pub async fn run(
        &self,
        mut req: RequestContext,
        authorization: Option<&Authorization>,
    ) -> Result<ApiResponse, ConnectorError> {
        self.prepare(&mut req, authorization);

        let mut before = BeforeExecute { req };
        self.observers
            .notify(HookContext::BeforeExecute(&mut before))
            .await?;
        let req = before.req;

        let key = self.cache.as_ref().and_then(|_| cache_key(&req));
        let cached = match (&self.cache, &key) {
            (Some(cache), Some(key)) => cache.lookup(key).await?,
            _ => None,
        };

        let mut fresh = false;
        let outcome = if let Some(hit) = cached {
            tracing::debug!(url = %req.url, "serving response from cache");
            Ok(hit)
        } else {
            let method = req.method.clone();
            let url = req.url.clone();
            let outcome = self.dispatch(req).await;
            fresh = outcome.is_ok();
            if let Err(err) = &outcome {
                tracing::debug!(%method, %url, error = %err, "request failed");
            }
            outcome
        };

        let mut after = match outcome {
            Ok(res) => AfterExecute {
                res: Some(res),
                err: None,
            },
            Err(err) => AfterExecute {
                res: None,
                err: Some(err),
            },
        };
        self.observers
            .notify(HookContext::AfterExecute(&mut after))
            .await?;

        let result = match after {
            AfterExecute { err: Some(err), .. } => Err(err),
            AfterExecute {
                res: Some(res),
                err: None,
            } => Ok(res),
            AfterExecute {
                res: None,
                err: None,
            } => Err(ConnectorError::EmptyResult),
        };

        if let (Ok(res), Some(cache), Some(key), true) = (&result, &self.cache, &key, fresh) {
            cache.save(key, res).await?;
        }
        result
    }
}
