//! # Task lifecycle values.
//!
//! ```text
//! Defined ──► Queued ──► Running ──► Completed(value)
//!    │                      ▲    ├─► Killed
//!    └──────────────────────┘    └─► Failed(diagnostic)
//! ```
//!
//! `Defined` is not a handle state: it only means a definition exists and
//! nothing is queued or running under that name.

use std::error::Error as StdError;
use std::fmt;

use crate::error::TaskError;

/// Observable state of a task name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Defined,
    Queued,
    Running,
    Completed,
    Killed,
    Failed,
}

impl TaskState {
    /// True for `Queued` and `Running`.
    pub fn is_live(self) -> bool {
        matches!(self, TaskState::Queued | TaskState::Running)
    }

    /// True for `Completed`, `Killed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Killed | TaskState::Failed
        )
    }
}

/// Value produced by a body that returned normally.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TaskValue {
    #[default]
    Unit,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl TaskValue {
    /// Returns the boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TaskValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<()> for TaskValue {
    fn from(_: ()) -> Self {
        TaskValue::Unit
    }
}

impl From<bool> for TaskValue {
    fn from(b: bool) -> Self {
        TaskValue::Bool(b)
    }
}

impl From<f64> for TaskValue {
    fn from(n: f64) -> Self {
        TaskValue::Number(n)
    }
}

impl From<String> for TaskValue {
    fn from(s: String) -> Self {
        TaskValue::Text(s)
    }
}

impl From<&str> for TaskValue {
    fn from(s: &str) -> Self {
        TaskValue::Text(s.to_string())
    }
}

impl fmt::Display for TaskValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskValue::Unit => f.write_str("()"),
            TaskValue::Bool(b) => write!(f, "{b}"),
            TaskValue::Number(n) => write!(f, "{n}"),
            TaskValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// What went wrong in a failed execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Stable label (`task_failed`, `vehicle_error`, `runtime_error`, `task_panicked`).
    pub label: &'static str,
    /// Top-level message.
    pub message: String,
    /// Messages of the error's source chain, outermost first.
    pub trace: Vec<String>,
}

impl Diagnostic {
    pub(crate) fn from_error(err: &TaskError) -> Self {
        let mut trace = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push(cause.to_string());
            source = cause.source();
        }
        Self {
            label: err.as_label(),
            message: err.to_string(),
            trace,
        }
    }

    pub(crate) fn from_panic(message: String) -> Self {
        Self {
            label: "task_panicked",
            message,
            trace: Vec::new(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.message)?;
        for cause in &self.trace {
            write!(f, "; caused by: {cause}")?;
        }
        Ok(())
    }
}

/// Terminal outcome of one execution.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskExit {
    Completed(TaskValue),
    Killed,
    Failed(Diagnostic),
}

impl TaskExit {
    /// Maps a body result to an exit: `Canceled` becomes `Killed`, any other error `Failed`.
    pub(crate) fn from_result(res: Result<TaskValue, TaskError>) -> Self {
        match res {
            Ok(value) => TaskExit::Completed(value),
            Err(TaskError::Canceled) => TaskExit::Killed,
            Err(e) => TaskExit::Failed(Diagnostic::from_error(&e)),
        }
    }

    pub fn state(&self) -> TaskState {
        match self {
            TaskExit::Completed(_) => TaskState::Completed,
            TaskExit::Killed => TaskState::Killed,
            TaskExit::Failed(_) => TaskState::Failed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskExit::Completed(_))
    }
}
