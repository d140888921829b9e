//! # Run one execution of a task.
//!
//! Drives a single execution of a [`Task`] body to its terminal outcome and
//! reports it back to the [`Supervisor`].
//!
//! ## Event flow
//!
//! ```text
//! Completed:  task.run(ctx) → Ok(value)        → publish TaskCompleted
//! Killed:     task.run(ctx) → Err(Canceled)    → publish TaskKilled
//! Failed:     task.run(ctx) → Err(other)       → publish TaskFailed
//!             task.run(ctx) → panic            → publish TaskFailed (task_panicked)
//!
//! then: ledger.sweep()  → supervisor.finish(name, id, exit) → notify main loop
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event per execution
//! - Open feeds are swept **before** the exit is recorded
//! - A panic never leaves the execution; it becomes `Failed`

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::lifecycle::{Diagnostic, TaskExit};
use crate::core::{Supervisor, panic_message};
use crate::events::{Event, EventKind};
use crate::tasks::{TaskContext, TaskRef};
use crate::telemetry::FeedLedger;

/// Executes `task` as execution `id` of `name` until it reaches a terminal outcome.
pub(crate) async fn run_execution(
    supervisor: Arc<Supervisor>,
    task: TaskRef,
    name: Arc<str>,
    id: u64,
    token: CancellationToken,
) {
    let ledger = FeedLedger::new(
        name.clone(),
        Arc::clone(supervisor.vehicle()),
        supervisor.bus().clone(),
    );
    let ctx = TaskContext::new(name.clone(), token, Arc::clone(&supervisor), ledger.clone());

    let exit = match AssertUnwindSafe(task.run(ctx)).catch_unwind().await {
        Ok(res) => TaskExit::from_result(res),
        Err(panic_err) => TaskExit::Failed(Diagnostic::from_panic(panic_message(
            panic_err.as_ref(),
        ))),
    };

    let swept = ledger.sweep();
    if swept > 0 {
        warn!(task = %name, handle = id, swept, "released feeds left open by the task");
    }

    publish_exit(&supervisor, &name, id, &exit);
    supervisor.finish(&name, id, exit);
}

fn publish_exit(supervisor: &Supervisor, name: &Arc<str>, id: u64, exit: &TaskExit) {
    let ev = match exit {
        TaskExit::Completed(value) => {
            debug!(task = %name, handle = id, %value, "task completed");
            Event::new(EventKind::TaskCompleted).with_reason(value.to_string())
        }
        TaskExit::Killed => {
            debug!(task = %name, handle = id, "task killed");
            Event::new(EventKind::TaskKilled)
        }
        TaskExit::Failed(diag) => {
            debug!(
                task = %name,
                handle = id,
                label = diag.label,
                trace = ?diag.trace,
                "task failed: {}",
                diag.message
            );
            Event::new(EventKind::TaskFailed).with_reason(diag.to_string())
        }
    };
    supervisor
        .bus()
        .publish(ev.with_task(name.clone()).with_handle(id));
}
