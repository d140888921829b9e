//! # Task registry - the supervisor's shared state.
//!
//! One [`Registry`] value holds everything that several contexts touch
//! concurrently: definitions, live handles, the pending-start queue, the exit
//! table and the batch/loop flags. The [`Supervisor`](crate::Supervisor) keeps it
//! behind a single mutex; every method here runs with that lock held.
//!
//! ## Architecture
//! ```text
//! definitions: name → TaskRef          (last define wins)
//! live:        name → Handle{id, token, exit?}
//!                  exit == None  → Running
//!                  exit == Some  → terminal, waiting for reap
//! pending:     VecDeque<name>           (FIFO, no duplicates)
//! exits:       name → TaskExit          (last reaped outcome)
//! ```
//!
//! ## Rules
//! - At most one handle per name in `live`.
//! - A terminal handle is reaped before a new one is inserted under its name.
//! - `finish` only touches the handle whose id matches (stale completions are ignored).

use std::collections::{HashMap, VecDeque};

use tokio_util::sync::CancellationToken;

use crate::core::lifecycle::{TaskExit, TaskState};
use crate::tasks::TaskRef;

/// Bookkeeping for one execution.
pub(crate) struct Handle {
    /// Monotonic execution id.
    pub id: u64,
    /// Cancellation token observed by the execution's checkpoints.
    pub cancel: CancellationToken,
    /// Set once the execution reports its outcome.
    pub exit: Option<TaskExit>,
}

impl Handle {
    fn is_running(&self) -> bool {
        self.exit.is_none()
    }
}

/// A handle removed from the live set.
pub(crate) struct Reaped {
    pub name: String,
    pub id: u64,
    pub exit: TaskExit,
}

#[derive(Default)]
pub(crate) struct Registry {
    definitions: HashMap<String, TaskRef>,
    live: HashMap<String, Handle>,
    pending: VecDeque<String>,
    exits: HashMap<String, TaskExit>,
    next_id: u64,
    /// Batch-load mode: starts are deflected into `pending`.
    pub loading: bool,
    /// A supervisory loop is active.
    pub looping: bool,
}

impl Registry {
    /// Registers or replaces a definition. Returns `true` when it replaced one.
    pub fn define(&mut self, task: TaskRef) -> bool {
        self.definitions
            .insert(task.name().to_string(), task)
            .is_some()
    }

    pub fn definition(&self, name: &str) -> Option<TaskRef> {
        self.definitions.get(name).cloned()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.live.get(name).is_some_and(Handle::is_running)
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.iter().any(|n| n == name)
    }

    /// Appends `name` to the pending queue unless already there.
    pub fn enqueue(&mut self, name: &str) -> bool {
        if self.is_pending(name) {
            return false;
        }
        self.pending.push_back(name.to_string());
        true
    }

    pub fn pop_pending(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    /// Removes a queued name; returns `true` if it was queued.
    pub fn remove_pending(&mut self, name: &str) -> bool {
        match self.pending.iter().position(|n| n == name) {
            Some(pos) => {
                self.pending.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn clear_pending(&mut self) -> Vec<String> {
        self.pending.drain(..).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Inserts a fresh running handle, reaping a terminal one left under the same name.
    pub fn insert_running(&mut self, name: &str, cancel: CancellationToken) -> (u64, Option<Reaped>) {
        let reaped = self.reap_one(name);
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(
            name.to_string(),
            Handle {
                id,
                cancel,
                exit: None,
            },
        );
        (id, reaped)
    }

    /// Records the outcome of execution `id`. Ignored if the handle is gone,
    /// belongs to another execution, or already has an outcome.
    pub fn finish(&mut self, name: &str, id: u64, exit: TaskExit) -> bool {
        match self.live.get_mut(name) {
            Some(h) if h.id == id && h.exit.is_none() => {
                h.exit = Some(exit);
                true
            }
            _ => false,
        }
    }

    /// Token of the running handle for `name`.
    pub fn running_token(&self, name: &str) -> Option<&CancellationToken> {
        self.live
            .get(name)
            .filter(|h| h.is_running())
            .map(|h| &h.cancel)
    }

    /// Cancels every running handle except `except`; returns the cancelled names.
    pub fn cancel_running(&self, except: Option<&str>) -> Vec<String> {
        let mut names = Vec::new();
        for (name, h) in &self.live {
            if h.is_running() && Some(name.as_str()) != except {
                h.cancel.cancel();
                names.push(name.clone());
            }
        }
        names.sort_unstable();
        names
    }

    pub fn has_running(&self) -> bool {
        self.live.values().any(Handle::is_running)
    }

    /// Records an exit for a name that never got a handle (killed while queued).
    /// A terminal handle left from an earlier execution is reaped first.
    pub fn record_exit(&mut self, name: &str, exit: TaskExit) -> Option<Reaped> {
        let reaped = self.reap_one(name);
        self.exits.insert(name.to_string(), exit);
        reaped
    }

    /// Removes every terminal handle, moving its outcome into the exit table.
    /// Idempotent: a second call right after returns nothing.
    pub fn reap(&mut self) -> Vec<Reaped> {
        let done: Vec<String> = self
            .live
            .iter()
            .filter(|(_, h)| !h.is_running())
            .map(|(name, _)| name.clone())
            .collect();
        done.iter().filter_map(|name| self.reap_one(name)).collect()
    }

    fn reap_one(&mut self, name: &str) -> Option<Reaped> {
        if self.is_running(name) {
            return None;
        }
        let handle = self.live.remove(name)?;
        let exit = handle.exit?;
        self.exits.insert(name.to_string(), exit.clone());
        Some(Reaped {
            name: name.to_string(),
            id: handle.id,
            exit,
        })
    }

    /// Outcome of the most recent execution of `name`, once terminal.
    pub fn exit_status(&self, name: &str) -> Option<TaskExit> {
        if self.is_running(name) || self.is_pending(name) {
            return None;
        }
        self.live
            .get(name)
            .and_then(|h| h.exit.clone())
            .or_else(|| self.exits.get(name).cloned())
    }

    pub fn state(&self, name: &str) -> Option<TaskState> {
        if self.is_running(name) {
            return Some(TaskState::Running);
        }
        if self.is_pending(name) {
            return Some(TaskState::Queued);
        }
        if let Some(exit) = self.exit_status(name) {
            return Some(exit.state());
        }
        self.is_defined(name).then_some(TaskState::Defined)
    }

    /// Sorted names of running handles.
    pub fn running(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .live
            .iter()
            .filter(|(_, h)| h.is_running())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn pending(&self) -> Vec<String> {
        self.pending.iter().cloned().collect()
    }

    pub fn defined(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Nothing live (running or awaiting reap) and nothing queued.
    pub fn is_idle(&self) -> bool {
        self.live.is_empty() && self.pending.is_empty()
    }
}
