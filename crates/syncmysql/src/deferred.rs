//! Deferred results of queued operations.

use std::fmt;

use syncmysql_core::{Error, Result};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::runtime::ensure_blocking_allowed;

enum State<T> {
    Pending(oneshot::Receiver<Result<T>>),
    Ready(Result<T>),
}

/// The eventual result of a queued operation.
///
/// Resolving it with [`wait`](Self::wait) blocks until the operation has
/// finished and yields exactly what the equivalent blocking call would
/// have returned. A handle is consumed by resolving it, so it can only be
/// resolved once.
///
/// Errors that happen before the operation is started (a disposed
/// connection, a statement that cannot be formatted) are stored in the
/// handle and surface when it is resolved.
pub struct Deferred<T> {
    state: State<T>,
}

impl<T> Deferred<T> {
    pub(crate) fn pending(receiver: oneshot::Receiver<Result<T>>) -> Self {
        Self {
            state: State::Pending(receiver),
        }
    }

    pub(crate) fn failed(error: Error) -> Self {
        Self {
            state: State::Ready(Err(error)),
        }
    }

    /// Whether the result is available, without blocking.
    pub fn is_ready(&mut self) -> bool {
        let State::Pending(receiver) = &mut self.state else {
            return true;
        };
        let resolved = match receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return false,
            // The task went away without reporting (runtime shut down).
            Err(TryRecvError::Closed) => Err(Error::Cancelled),
        };
        self.state = State::Ready(resolved);
        true
    }

    /// Block until the operation has finished and return its result.
    ///
    /// A result that is already available is returned from any context;
    /// actually blocking from inside an async runtime is refused with
    /// `Error::Config`.
    pub fn wait(mut self) -> Result<T> {
        if !self.is_ready() {
            ensure_blocking_allowed()?;
        }
        match self.state {
            State::Ready(result) => result,
            State::Pending(receiver) => receiver.blocking_recv().unwrap_or(Err(Error::Cancelled)),
        }
    }

    /// Turn the handle into a nullary closure that resolves it.
    pub fn into_fn(self) -> impl FnOnce() -> Result<T> {
        move || self.wait()
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Pending(_) => "pending",
            State::Ready(Ok(_)) => "ok",
            State::Ready(Err(_)) => "failed",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}
