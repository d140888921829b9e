//! # Task abstractions.
//!
//! This module provides the task-related types:
//! - [`Task`] - trait for implementing async, cooperatively cancellable tasks
//! - [`TaskFn`] - function-based task implementation
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)
//! - [`TaskContext`] - per-execution handle: checkpoints, pacing, telemetry, supervisor

mod context;
mod task;
mod task_fn;

pub use context::TaskContext;
pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;
