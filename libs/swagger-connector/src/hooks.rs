//! Observer hooks around request execution.
//!
//! Observers for an event run one at a time in registration order. Each gets a
//! mutable view of the pipeline state; the first failure stops notification
//! and becomes the invocation's error.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use crate::error::ConnectorError;
use crate::request::RequestContext;
use crate::response::ApiResponse;

/// Error type observers fail with.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    BeforeExecute,
    AfterExecute,
}

impl HookEvent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            HookEvent::BeforeExecute => "before execute",
            HookEvent::AfterExecute => "after execute",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown hook event '{0}'")]
pub struct UnknownHookEvent(String);

impl FromStr for HookEvent {
    type Err = UnknownHookEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before execute" => Ok(HookEvent::BeforeExecute),
            "after execute" => Ok(HookEvent::AfterExecute),
            other => Err(UnknownHookEvent(other.to_owned())),
        }
    }
}

/// State seen by `before execute` observers. Replacing `req` replaces the
/// request that is cached and dispatched.
#[derive(Debug)]
pub struct BeforeExecute {
    pub req: RequestContext,
}

/// State seen by `after execute` observers.
///
/// On success `res` is set and `err` is `None`; on failure `res` is `None`
/// and `err` holds the transport or status error. Observers may swap either.
#[derive(Debug)]
pub struct AfterExecute {
    pub res: Option<ApiResponse>,
    pub err: Option<ConnectorError>,
}

/// Mutable context handed to an observer.
#[derive(Debug)]
pub enum HookContext<'a> {
    BeforeExecute(&'a mut BeforeExecute),
    AfterExecute(&'a mut AfterExecute),
}

impl HookContext<'_> {
    #[must_use]
    pub fn event(&self) -> HookEvent {
        match self {
            HookContext::BeforeExecute(_) => HookEvent::BeforeExecute,
            HookContext::AfterExecute(_) => HookEvent::AfterExecute,
        }
    }

    /// Shorter-lived copy, so one context can be handed to several observers.
    pub fn reborrow(&mut self) -> HookContext<'_> {
        match self {
            HookContext::BeforeExecute(ctx) => HookContext::BeforeExecute(&mut **ctx),
            HookContext::AfterExecute(ctx) => HookContext::AfterExecute(&mut **ctx),
        }
    }

    /// Outgoing request, only available before execution.
    pub fn request_mut(&mut self) -> Option<&mut RequestContext> {
        match self {
            HookContext::BeforeExecute(ctx) => Some(&mut ctx.req),
            HookContext::AfterExecute(_) => None,
        }
    }

    #[must_use]
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            HookContext::BeforeExecute(_) => None,
            HookContext::AfterExecute(ctx) => ctx.res.as_ref(),
        }
    }
}

#[async_trait]
pub trait Observer: Send + Sync {
    /// # Errors
    /// A returned error aborts the remaining pipeline stages.
    async fn observe(&self, ctx: HookContext<'_>) -> Result<(), ObserverError>;
}

/// Observer backed by a synchronous closure.
pub struct FnObserver<F>(F);

#[async_trait]
impl<F> Observer for FnObserver<F>
where
    F: Fn(HookContext<'_>) -> Result<(), ObserverError> + Send + Sync,
{
    async fn observe(&self, ctx: HookContext<'_>) -> Result<(), ObserverError> {
        (self.0)(ctx)
    }
}

/// Wrap a closure as an [`Observer`].
#[must_use]
pub fn observer_fn<F>(f: F) -> FnObserver<F>
where
    F: Fn(HookContext<'_>) -> Result<(), ObserverError> + Send + Sync,
{
    FnObserver(f)
}

/// Observers per event, empty by default.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<HashMap<HookEvent, Vec<Arc<dyn Observer>>>>,
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let observers = self.observers.read();
        f.debug_struct("ObserverRegistry")
            .field("before_execute", &observers.get(&HookEvent::BeforeExecute).map_or(0, Vec::len))
            .field("after_execute", &observers.get(&HookEvent::AfterExecute).map_or(0, Vec::len))
            .finish()
    }
}

impl ObserverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, event: HookEvent, observer: Arc<dyn Observer>) {
        self.observers.write().entry(event).or_default().push(observer);
    }

    /// Drop every observer registered for `event`.
    pub fn clear(&self, event: HookEvent) {
        self.observers.write().remove(&event);
    }

    #[must_use]
    pub fn count(&self, event: HookEvent) -> usize {
        self.observers.read().get(&event).map_or(0, Vec::len)
    }

    fn snapshot(&self, event: HookEvent) -> Vec<Arc<dyn Observer>> {
        self.observers.read().get(&event).cloned().unwrap_or_default()
    }

    /// Run the observers registered for the context's event in order.
    ///
    /// Observers registered while notification is running are not called
    /// for this notification.
    ///
    /// # Errors
    /// Returns [`ConnectorError::Observer`] with the first failure.
    pub async fn notify(&self, mut ctx: HookContext<'_>) -> Result<(), ConnectorError> {
        let event = ctx.event();
        for observer in self.snapshot(event) {
            observer
                .observe(ctx.reborrow())
                .await
                .map_err(|source| ConnectorError::Observer { event, source })?;
        }
        Ok(())
    }
}
