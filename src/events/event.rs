//! # Runtime events emitted by the supervisor and task executions.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Registry events**: definitions, queueing, batches
//! - **Lifecycle events**: task execution flow (starting, completed, killed, failed, reaped)
//! - **Diagnostics**: duplicate starts and kills of absent tasks (not errors)
//! - **Resource events**: telemetry feeds opened/released
//!
//! The [`Event`] struct carries additional metadata such as timestamps, task name and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use flightvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task("burn")
//!     .with_reason("no engines available");
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("burn"));
//! assert_eq!(ev.reason.as_deref(), Some("no engines available"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason`.
    SubscriberOverflow,

    // === Registry events ===
    /// A definition was registered or replaced.
    ///
    /// Sets: `task`.
    TaskDefined,

    /// A start was deflected into the pending queue (batch-load mode).
    ///
    /// Sets: `task`.
    TaskQueued,

    /// A definition batch began.
    BatchStarted,

    /// A definition batch ended.
    ///
    /// Sets: `reason` when the loader failed or panicked.
    BatchFinished,

    // === Lifecycle events ===
    /// An execution was spawned for the task.
    ///
    /// Sets: `task`, `handle`.
    TaskStarting,

    /// The body returned normally.
    ///
    /// Sets: `task`, `handle`, `reason` (rendered return value).
    TaskCompleted,

    /// The body observed cancellation at a checkpoint.
    ///
    /// Sets: `task`, `handle`.
    TaskKilled,

    /// The body returned an error or panicked.
    ///
    /// Sets: `task`, `handle`, `reason` (diagnostic).
    TaskFailed,

    /// A terminal handle was removed from the live set.
    ///
    /// Sets: `task`, `handle`.
    TaskReaped,

    /// A cancellation signal was delivered.
    ///
    /// Sets: `task`, `reason` (who asked, if known).
    KillRequested,

    // === Diagnostics ===
    /// `start` was called while the task is already live.
    ///
    /// Sets: `task`.
    DuplicateStart,

    /// `kill` was called for a task with no live handle.
    ///
    /// Sets: `task`.
    KillOfAbsentTask,

    // === Resource events ===
    /// A telemetry feed was opened by a task.
    ///
    /// Sets: `task`, `feed`.
    FeedOpened,

    /// A telemetry feed was released.
    ///
    /// Sets: `task`, `feed`, `reason` (`"scope"` or `"sweep"`).
    FeedReleased,

    // === Shutdown events ===
    /// Shutdown requested (OS signal observed or explicit call).
    ShutdownRequested,

    /// All tasks stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some tasks did not reach a checkpoint in time.
    ///
    /// Sets: `reason` (stuck task names).
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Handle id of the execution, if applicable.
    pub handle: Option<u64>,
    /// Telemetry feed name, if applicable.
    pub feed: Option<Arc<str>>,
    /// Human-readable reason (errors, values, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            handle: None,
            feed: None,
            reason: None,
        }
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches an execution handle id.
    #[inline]
    pub fn with_handle(mut self, id: u64) -> Self {
        self.handle = Some(id);
        self
    }

    /// Attaches a telemetry feed name.
    #[inline]
    pub fn with_feed(mut self, feed: impl Into<Arc<str>>) -> Self {
        self.feed = Some(feed.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// True for the three terminal lifecycle kinds.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TaskCompleted | EventKind::TaskKilled | EventKind::TaskFailed
        )
    }
}
