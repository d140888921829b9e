//! Error types used by the flightvisor runtime, tasks and the vehicle boundary.
//!
//! This module defines three enums:
//!
//! - [`RuntimeError`]: supervisor misuse that surfaces to the caller immediately.
//! - [`TaskError`]: errors raised inside a task body; always contained at the task boundary.
//! - [`VehicleError`]: failures reported by the vehicle-control collaborator.
//!
//! Starting an already-live task and killing an absent one are **not** errors:
//! they are reported as diagnostics (events + warn logs) and the call succeeds.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the supervisor itself.
///
/// Only supervisor-level misuse ends up here; faults inside task bodies are
/// captured as [`TaskExit::Failed`](crate::TaskExit::Failed) instead.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// `start` was called for a name with no registered definition.
    #[error("task definition not found: {name}")]
    UnknownTask {
        /// Requested task name.
        name: String,
    },

    /// `run` was called while another supervisory loop is active.
    #[error("supervisory loop already running")]
    AlreadyRunning,

    /// `load_definitions` was called while a batch is already loading.
    #[error("definition batch already in progress")]
    BatchInProgress,

    /// Shutdown grace period was exceeded; some tasks never reached a checkpoint.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the tasks still running.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    ///
    /// # Example
    /// ```
    /// use flightvisor::RuntimeError;
    ///
    /// let err = RuntimeError::UnknownTask { name: "burn".into() };
    /// assert_eq!(err.as_label(), "runtime_unknown_task");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::UnknownTask { .. } => "runtime_unknown_task",
            RuntimeError::AlreadyRunning => "runtime_already_running",
            RuntimeError::BatchInProgress => "runtime_batch_in_progress",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Errors reported by the vehicle-control collaborator.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VehicleError {
    /// The named telemetry feed could not be opened or read.
    #[error("telemetry feed unavailable: {feed}")]
    FeedUnavailable {
        /// Feed name as given in the [`FeedSpec`](crate::FeedSpec).
        feed: String,
    },

    /// The vehicle refused a command.
    #[error("command {command} rejected: {reason}")]
    CommandRejected {
        /// Rendered command.
        command: String,
        /// Collaborator-supplied reason.
        reason: String,
    },

    /// The connection to the vehicle is gone.
    #[error("vehicle disconnected")]
    Disconnected,
}

/// # Errors produced inside a task body.
///
/// [`TaskError::Canceled`] is the cooperative-cancellation marker: returning it
/// (usually by propagating it from a checkpoint with `?`) ends the execution as
/// [`TaskExit::Killed`](crate::TaskExit::Killed). Every other variant ends it as
/// [`TaskExit::Failed`](crate::TaskExit::Failed).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// A cancellation signal was observed at a checkpoint.
    #[error("task cancelled")]
    Canceled,

    /// Task logic failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The vehicle collaborator reported an error.
    #[error("vehicle error")]
    Vehicle(#[from] VehicleError),

    /// A supervisor call made from inside the task failed.
    #[error("supervisor error")]
    Runtime(#[from] RuntimeError),
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    ///
    /// # Example
    /// ```
    /// use flightvisor::TaskError;
    ///
    /// let err = TaskError::fail("no maneuver node");
    /// assert_eq!(err.to_string(), "execution failed: no maneuver node");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Canceled => "task_canceled",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Vehicle(_) => "vehicle_error",
            TaskError::Runtime(_) => "runtime_error",
        }
    }

    /// True when this is the cooperative-cancellation marker.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}
