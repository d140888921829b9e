//! # Task abstraction.
//!
//! A [`Task`] has a stable [`name`](Task::name), its registry key, and an async
//! [`run`](Task::run) method that receives a [`TaskContext`]. The common handle
//! type is [`TaskRef`], an `Arc<dyn Task>` shared between the registry and every
//! execution spawned from it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::TaskValue;
use crate::error::TaskError;
use crate::tasks::TaskContext;

/// # Asynchronous, cooperatively cancellable unit of control logic.
///
/// Implementors should reach a checkpoint ([`TaskContext::pace`],
/// [`TaskContext::sleep`], [`TaskContext::checkpoint`]) regularly and propagate
/// its error with `?`; a task that never checks in can never be killed.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use flightvisor::{Task, TaskContext, TaskError, TaskValue};
/// use std::time::Duration;
///
/// struct HeatLimiter;
///
/// #[async_trait]
/// impl Task for HeatLimiter {
///     fn name(&self) -> &str { "heat_limiter" }
///
///     async fn run(&self, ctx: TaskContext) -> Result<TaskValue, TaskError> {
///         loop {
///             // read temperatures, adjust throttle...
///             ctx.pace(Duration::from_millis(300)).await?;
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Returns the registry key of this task.
    fn name(&self) -> &str;

    /// Executes the task until completion, failure or cancellation.
    async fn run(&self, ctx: TaskContext) -> Result<TaskValue, TaskError>;
}

/// Shared handle to a task definition.
pub type TaskRef = Arc<dyn Task>;
