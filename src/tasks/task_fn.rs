//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(TaskContext) -> Fut`, producing a fresh
//! future per execution. There is no hidden state shared between executions;
//! share state explicitly with `Arc<...>` captured by the closure.
//!
//! ## Example
//! ```rust
//! use flightvisor::{TaskFn, TaskRef, TaskContext, TaskError};
//!
//! let t: TaskRef = TaskFn::arc("autostage", |ctx: TaskContext| async move {
//!     ctx.checkpoint().await?;
//!     Ok::<_, TaskError>(true)
//! });
//!
//! assert_eq!(t.name(), "autostage");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::TaskValue;
use crate::error::TaskError;
use crate::tasks::{Task, TaskContext};

/// Function-backed task implementation.
#[derive(Debug)]
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`](crate::TaskRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut, V> Task for TaskFn<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, TaskError>> + Send + 'static,
    V: Into<TaskValue> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskValue, TaskError> {
        (self.f)(ctx).await.map(Into::into)
    }
}
