//! # LogWriter: renders runtime events through `tracing`
//!
//! A minimal subscriber that turns each [`Event`] into one `tracing` record
//! under the `flightvisor::events` target. Install any `tracing` subscriber
//! (e.g. `tracing_subscriber::fmt`) to see the output.
//!
//! ## Example output
//! ```text
//! INFO  flightvisor::events: starting task="burn" handle=3
//! WARN  flightvisor::events: duplicate start ignored task="burn"
//! INFO  flightvisor::events: killed task="launch" handle=1
//! ERROR flightvisor::events: failed task="docking" handle=4 err="execution failed: no target docking port"
//! DEBUG flightvisor::events: feed released task="burn" feed="space_center.ut" via="scope"
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        let feed = e.feed.as_deref().unwrap_or("-");
        let handle = e.handle.unwrap_or_default();

        match e.kind {
            EventKind::TaskDefined => {
                debug!(target: "flightvisor::events", task, "defined");
            }
            EventKind::TaskQueued => {
                info!(target: "flightvisor::events", task, "queued until batch ends");
            }
            EventKind::BatchStarted => {
                debug!(target: "flightvisor::events", "batch started");
            }
            EventKind::BatchFinished => {
                debug!(target: "flightvisor::events", reason, "batch finished");
            }
            EventKind::TaskStarting => {
                info!(target: "flightvisor::events", task, handle, "starting");
            }
            EventKind::TaskCompleted => {
                info!(target: "flightvisor::events", task, handle, value = reason, "completed");
            }
            EventKind::TaskKilled => {
                info!(target: "flightvisor::events", task, handle, "killed");
            }
            EventKind::TaskFailed => {
                error!(target: "flightvisor::events", task, handle, err = reason, "failed");
            }
            EventKind::TaskReaped => {
                debug!(target: "flightvisor::events", task, handle, "reaped");
            }
            EventKind::KillRequested => {
                info!(target: "flightvisor::events", task, by = reason, "kill requested");
            }
            EventKind::DuplicateStart => {
                warn!(target: "flightvisor::events", task, "duplicate start ignored");
            }
            EventKind::KillOfAbsentTask => {
                warn!(target: "flightvisor::events", task, "kill ignored, not running");
            }
            EventKind::FeedOpened => {
                debug!(target: "flightvisor::events", task, feed, "feed opened");
            }
            EventKind::FeedReleased => {
                debug!(target: "flightvisor::events", task, feed, via = reason, "feed released");
            }
            EventKind::ShutdownRequested => {
                warn!(target: "flightvisor::events", "shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                info!(target: "flightvisor::events", "all tasks stopped within grace");
            }
            EventKind::GraceExceeded => {
                error!(target: "flightvisor::events", stuck = reason, "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "flightvisor::events", subscriber = task, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(target: "flightvisor::events", subscriber = task, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
