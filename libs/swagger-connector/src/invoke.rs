//! Calling conventions.
//!
//! Every operation produces one canonical future. Callers either await it
//! directly or hand over a trailing [`Callback`], in which case the future is
//! spawned on the runtime and the callback receives the outcome exactly once.

use futures::future::BoxFuture;
use tokio::task::JoinHandle;

use crate::error::ConnectorError;
use crate::response::ApiResponse;

/// Outcome of one invocation.
pub type InvocationResult = Result<ApiResponse, ConnectorError>;

/// Canonical invocation future.
pub type InvocationFuture = BoxFuture<'static, InvocationResult>;

/// Completion callback for callback-style callers.
pub type Callback = Box<dyn FnOnce(InvocationResult) + Send + 'static>;

/// Wrap a closure as a [`Callback`].
#[must_use]
pub fn callback<F>(f: F) -> Callback
where
    F: FnOnce(InvocationResult) + Send + 'static,
{
    Box::new(f)
}

/// An invocation in the style the caller picked.
pub enum Invocation {
    /// Future style: the caller awaits the outcome
    Pending(InvocationFuture),
    /// Callback style: running on the runtime, the callback gets the outcome
    Spawned(JoinHandle<()>),
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Invocation::Pending(_) => f.write_str("Invocation::Pending"),
            Invocation::Spawned(handle) => f
                .debug_tuple("Invocation::Spawned")
                .field(&handle.is_finished())
                .finish(),
        }
    }
}

impl Invocation {
    #[must_use]
    pub fn is_spawned(&self) -> bool {
        matches!(self, Invocation::Spawned(_))
    }

    /// Drive the invocation to completion.
    ///
    /// Returns the outcome for future-style invocations. For callback-style
    /// ones the outcome went to the callback, so this only waits for it to
    /// have run and returns `None`.
    pub async fn settle(self) -> Option<InvocationResult> {
        match self {
            Invocation::Pending(fut) => Some(fut.await),
            Invocation::Spawned(handle) => {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "callback task failed");
                }
                None
            }
        }
    }
}

/// Pick the calling convention by whether a callback was supplied.
///
/// Must be called within a tokio runtime when `callback` is `Some`.
#[must_use]
pub fn dispatch(fut: InvocationFuture, callback: Option<Callback>) -> Invocation {
    match callback {
        None => Invocation::Pending(fut),
        Some(callback) => Invocation::Spawned(tokio::spawn(async move {
            callback(fut.await);
        })),
    }
}
