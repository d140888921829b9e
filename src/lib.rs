//! # flightvisor
//!
//! **Flightvisor** supervises named, long-running control routines ("tasks")
//! that drive a vehicle through an opaque control interface.
//!
//! Tasks are registered by name, started and killed from one another, pace
//! themselves in simulated time that follows an externally controlled
//! dilation factor, and hold telemetry feeds that are always released in
//! reverse acquisition order, however the task ends.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Task "a"    │   │  Task "b"    │   │  Task "c"    │
//!     │ (definition) │   │ (definition) │   │ (definition) │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - Registry (definitions, live handles, pending queue, exits)     │
//! │  - Bus (broadcast events) + SubscriberSet (per-subscriber queues) │
//! │  - Vehicle + Clock (shared collaborators)                         │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │  execution   │   │  execution   │   │  execution   │   │
//!     │ TaskContext  │   │ TaskContext  │   │ TaskContext  │   │
//!     │ FeedLedger   │   │ FeedLedger   │   │ FeedLedger   │   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      │ TaskStarting     │ FeedOpened       │ TaskKilled      │ TaskQueued
//!      │ TaskCompleted    │ FeedReleased     │ TaskFailed      │ TaskReaped
//!      ▼                  ▼                  ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                     subscriber_listener ──► SubscriberSet
//!                                  ┌─────────┼─────────┐
//!                                  ▼         ▼         ▼
//!                              LogWriter   sub2      subN
//! ```
//!
//! ### Lifecycle
//! ```text
//! define(task) ──► Defined
//! start(name)  ──► Queued (batch loading) ──► Running ──┬─► Completed(value)
//!              └──────────────────────────► Running ──┼─► Killed   (kill + checkpoint)
//!                                                      └─► Failed   (error or panic)
//! terminal handles are reaped by run() (or inline by the next start)
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                          |
//! |-------------------|-------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Named registry, start/kill/query, batch loading, main loop. | [`Supervisor`], [`TaskState`], [`TaskExit`] |
//! | **Tasks**         | Bodies as closures or trait impls, with a per-run context.  | [`Task`], [`TaskFn`], [`TaskContext`]       |
//! | **Telemetry**     | Scoped feeds released in reverse order.                     | [`Vehicle`], [`FeedSet`], [`Subscription`]  |
//! | **Time**          | Dilation-aware, cancellable pacing.                         | [`Clock`], [`ManualClock`], [`pace`]        |
//! | **Subscriber API**| Hook into lifecycle events.                                 | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed supervisor, task and vehicle errors.                  | [`RuntimeError`], [`TaskError`]             |
//! | **Configuration** | Intervals, grace period, bus capacity.                      | [`SupervisorConfig`]                        |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use flightvisor::{
//!     Command, FeedSpec, ManualClock, Supervisor, TaskContext, TaskError, TaskFn, Vehicle,
//! };
//!
//! # async fn demo(vehicle: Arc<dyn Vehicle>) -> Result<(), Box<dyn std::error::Error>> {
//! let sup = Supervisor::builder(vehicle, Arc::new(ManualClock::default())).build();
//!
//! sup.define(TaskFn::arc("autostage", |ctx: TaskContext| async move {
//!     let feeds = ctx.acquire(&[FeedSpec::new("vessel.thrust")])?;
//!     while feeds.value(0)? > 0.0 {
//!         ctx.pace(Duration::from_millis(100)).await?;
//!     }
//!     ctx.command(&Command::trigger("stage"))?;
//!     Ok::<_, TaskError>(())
//! }));
//!
//! sup.start("autostage")?;
//! sup.run().await?;
//! # Ok(())
//! # }
//! ```

mod clock;
mod core;
mod error;
mod events;
mod subscribers;
mod tasks;
mod telemetry;

#[cfg(test)]
mod testkit;

// ---- Public re-exports ----

pub use clock::{Clock, ManualClock, pace};
pub use core::{
    Diagnostic, Supervisor, SupervisorBuilder, SupervisorConfig, TaskExit, TaskState, TaskValue,
};
pub use error::{RuntimeError, TaskError, VehicleError};
pub use events::{Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{Task, TaskContext, TaskFn, TaskRef};
pub use telemetry::{Command, FeedId, FeedSet, FeedSpec, Subscription, Vehicle};

// Built-in logger subscriber.
// Enabled by default through the `logging` feature.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
