/*!
# Task Module

This module defines the unit of work accepted by the dispatcher.

A task is opaque: it has no identity, priority or deadline and produces no
result. It comes in two forms:
- A blocking closure, executed on the tokio blocking thread pool so that
  sleeping or CPU-bound work never stalls the async workers
- A future, polled directly on the tokio runtime

Once submitted, the dispatcher owns the task until it has run.
*/

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;

/// A zero-argument unit of work
pub enum Task {
    /// Synchronous closure run on the blocking pool
    Blocking(Box<dyn FnOnce() + Send + 'static>),

    /// Future polled on the async runtime
    Async(BoxFuture<'static, ()>),
}

impl Task {
    /// Wrap a synchronous closure
    pub fn blocking<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::Blocking(Box::new(f))
    }

    /// Wrap a future
    pub fn future<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::Async(fut.boxed())
    }

    /// Short label used in log output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Blocking(_) => "blocking",
            Self::Async(_) => "async",
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Task").field(&self.kind()).finish()
    }
}
