//! # Per-execution task context.
//!
//! Every execution receives its own [`TaskContext`]: the task's name, its
//! cancellation token, its telemetry ledger and the owning [`Supervisor`].
//!
//! ## Checkpoints
//! Cancellation is only ever observed at checkpoints:
//! - [`TaskContext::checkpoint`]
//! - [`TaskContext::pace`] (simulated time, dilation-aware)
//! - [`TaskContext::sleep`] (real time)
//! - [`TaskContext::run_and_wait`]
//! - any checkpoint inside a body run through [`TaskContext::execute`]
//!
//! [`TaskContext::command`] is **not** a checkpoint: a command that
//! has been started is always handed to the vehicle in full.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::clock::{self, Clock};
use crate::core::{Supervisor, TaskValue};
use crate::error::{RuntimeError, TaskError};
use crate::tasks::TaskRef;
use crate::telemetry::{Command, FeedLedger, FeedSet, FeedSpec};

/// Handle given to a running task body.
#[derive(Clone)]
pub struct TaskContext {
    name: Arc<str>,
    token: CancellationToken,
    supervisor: Arc<Supervisor>,
    ledger: Arc<FeedLedger>,
}

impl TaskContext {
    pub(crate) fn new(
        name: Arc<str>,
        token: CancellationToken,
        supervisor: Arc<Supervisor>,
        ledger: Arc<FeedLedger>,
    ) -> Self {
        Self {
            name,
            token,
            supervisor,
            ledger,
        }
    }

    /// Name of the running task.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The supervisor this task runs under.
    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// This execution's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True once a kill has been requested (does not stop anything by itself).
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Explicit checkpoint: yields to the scheduler, then fails with
    /// [`TaskError::Canceled`] if a kill was requested.
    pub async fn checkpoint(&self) -> Result<(), TaskError> {
        if self.token.is_cancelled() {
            return Err(TaskError::Canceled);
        }
        tokio::task::yield_now().await;
        if self.token.is_cancelled() {
            return Err(TaskError::Canceled);
        }
        Ok(())
    }

    /// Waits `requested` simulated time, scaled by the current dilation factor.
    pub async fn pace(&self, requested: Duration) -> Result<(), TaskError> {
        clock::pace(
            self.supervisor.clock().as_ref(),
            &self.token,
            requested,
            self.supervisor.config().pacing_slice(),
        )
        .await
    }

    /// Waits `duration` real time regardless of dilation.
    pub async fn sleep(&self, duration: Duration) -> Result<(), TaskError> {
        if self.token.is_cancelled() {
            return Err(TaskError::Canceled);
        }
        select! {
            _ = time::sleep(duration) => Ok(()),
            _ = self.token.cancelled() => Err(TaskError::Canceled),
        }
    }

    /// Current simulated time, read fresh.
    pub fn now(&self) -> f64 {
        self.supervisor.clock().now()
    }

    /// Current dilation factor, read fresh.
    pub fn dilation(&self) -> f64 {
        self.supervisor.clock().dilation()
    }

    /// Opens the feeds in order. They stay open until the returned set is dropped.
    pub fn acquire(&self, specs: &[FeedSpec]) -> Result<FeedSet, TaskError> {
        Ok(self.ledger.acquire(specs)?)
    }

    /// Scoped acquisition: opens the feeds, runs `scope` with them and releases
    /// them in reverse order however `scope` ends.
    ///
    /// ```no_run
    /// # use flightvisor::{TaskContext, TaskError, FeedSpec};
    /// # use std::time::Duration;
    /// # async fn body(ctx: TaskContext) -> Result<(), TaskError> {
    /// let inner = ctx.clone();
    /// ctx.with_feeds(&[FeedSpec::new("flight.mean_altitude")], |feeds| async move {
    ///     while feeds.value(0)? > 10_000.0 {
    ///         inner.pace(Duration::from_millis(100)).await?;
    ///     }
    ///     Ok(())
    /// })
    /// .await
    /// # }
    /// ```
    pub async fn with_feeds<F, Fut, T>(&self, specs: &[FeedSpec], scope: F) -> Result<T, TaskError>
    where
        F: FnOnce(FeedSet) -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        let feeds = self.acquire(specs)?;
        scope(feeds).await
    }

    /// Number of feeds this execution currently holds open.
    pub fn open_feeds(&self) -> usize {
        self.ledger.open_count()
    }

    /// Sends a command to the vehicle. Never observes cancellation.
    pub fn command(&self, command: &Command) -> Result<(), TaskError> {
        Ok(self.supervisor.vehicle().issue(command)?)
    }

    /// Starts another task (see [`Supervisor::start`]).
    pub fn start(&self, name: &str) -> Result<(), RuntimeError> {
        self.supervisor.start(name)
    }

    /// Kills another task (see [`Supervisor::kill`]).
    pub fn kill(&self, name: &str) {
        self.supervisor.kill(name)
    }

    /// Kills every live task except this one.
    pub fn kill_others(&self) {
        self.supervisor.kill_all_except(&self.name)
    }

    /// Runs `task`'s body inline, with its own context and feed ledger but
    /// without registering it (see [`Supervisor::execute`]).
    ///
    /// The inline body observes a child of this execution's token, so killing
    /// this task also stops it at its next checkpoint.
    pub async fn execute(&self, task: TaskRef) -> Result<TaskValue, TaskError> {
        self.supervisor
            .execute_with(task, self.token.child_token())
            .await
    }

    /// True while `name` has a running handle.
    pub fn is_running(&self, name: &str) -> bool {
        self.supervisor.is_running(name)
    }

    /// Starts `name` and waits for it to finish; `true` only if it completed.
    ///
    /// Unlike [`Supervisor::run_and_wait`], this is a checkpoint: if this task
    /// is killed while waiting, it returns [`TaskError::Canceled`] (the awaited
    /// task keeps running).
    pub async fn run_and_wait(&self, name: &str) -> Result<bool, TaskError> {
        if self.token.is_cancelled() {
            return Err(TaskError::Canceled);
        }
        select! {
            res = self.supervisor.run_and_wait(name) => Ok(res?),
            _ = self.token.cancelled() => Err(TaskError::Canceled),
        }
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("name", &self.name)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
