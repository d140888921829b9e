//! # Supervisor: named task registry, batch loading and the supervisory loop.
//!
//! The [`Supervisor`] owns the registry (definitions, live handles, pending
//! queue, exit table), the event bus and the [`SubscriberSet`]. Task bodies
//! reach it through [`TaskContext::supervisor`](crate::TaskContext::supervisor)
//! to start, kill and wait for each other.
//!
//! ## Key responsibilities
//! - register definitions and spawn one execution per `start`
//! - deliver cooperative kills through per-execution cancellation tokens
//! - deflect starts into the pending queue while a batch is loading
//! - reap terminal handles from the main loop, woken by each completion
//! - subscribe to the [`Bus`] and **fan-out** events via [`SubscriberSet`]
//!
//! ## High-level architecture
//! ```text
//! start(name) ──► registry lock ─┬─ running?   → DuplicateStart (no-op)
//!                                ├─ queued?    → no-op
//!                                ├─ loading?   → pending.push_back(name)
//!                                └─ otherwise  → Handle{id, token} + tokio::spawn(run_execution)
//!
//! run_execution ── body ── sweep feeds ──► finish(name, id, exit) ──► Notify
//!                                                                      │
//! run():  drain pending (start_spacing apart)                          │
//!         loop { reap; idle? → return;  select!{ notified ◄────────────┘
//!                                                 reap_interval
//!                                                 OS signal → shutdown() } }
//!
//! Event flow:
//!   Supervisor / executions / feeds ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use flightvisor::{ManualClock, Supervisor, TaskContext, TaskError, TaskFn, Vehicle};
//!
//! # async fn demo(vehicle: Arc<dyn Vehicle>) -> Result<(), Box<dyn std::error::Error>> {
//! let clock = Arc::new(ManualClock::default());
//! let sup = Supervisor::builder(vehicle, clock).build();
//!
//! sup.load_definitions(|sup| async move {
//!     sup.define(TaskFn::arc("countdown", |ctx: TaskContext| async move {
//!         for _ in 0..10 {
//!             ctx.pace(Duration::from_secs(1)).await?;
//!         }
//!         Ok::<_, TaskError>(())
//!     }));
//!     sup.start("countdown")
//! })
//! .await??;
//!
//! sup.run().await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::sync::{Notify, broadcast};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::core::builder::SupervisorBuilder;
use crate::core::config::SupervisorConfig;
use crate::core::lifecycle::{TaskExit, TaskState, TaskValue};
use crate::core::registry::{Reaped, Registry};
use crate::core::{panic_message, runner, shutdown};
use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::SubscriberSet;
use crate::tasks::{TaskContext, TaskRef};
use crate::telemetry::{FeedLedger, Vehicle};

/// Registry of named tasks plus the loop that supervises them.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    vehicle: Arc<dyn Vehicle>,
    clock: Arc<dyn Clock>,
    registry: Mutex<Registry>,
    exited: Notify,
}

impl Supervisor {
    /// Starts building a supervisor around a vehicle and a clock.
    pub fn builder(vehicle: Arc<dyn Vehicle>, clock: Arc<dyn Clock>) -> SupervisorBuilder {
        SupervisorBuilder::new(vehicle, clock)
    }

    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        vehicle: Arc<dyn Vehicle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            vehicle,
            clock,
            registry: Mutex::new(Registry::default()),
            exited: Notify::new(),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn vehicle(&self) -> &Arc<dyn Vehicle> {
        &self.vehicle
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Receiver observing every event published after this call.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Registers `task` under its name, replacing any previous definition.
    ///
    /// A running execution of the old definition is not touched; the next
    /// `start` uses the new one.
    pub fn define(&self, task: TaskRef) {
        let name: Arc<str> = Arc::from(task.name());
        let replaced = self.lock().define(task);
        debug!(task = %name, replaced, "task defined");
        self.bus
            .publish(Event::new(EventKind::TaskDefined).with_task(name));
    }

    /// Starts `name`.
    ///
    /// - already running: diagnostic only, `Ok(())`
    /// - already queued: no-op
    /// - batch loading: appended to the pending queue
    /// - no definition: [`RuntimeError::UnknownTask`]
    ///
    /// Otherwise a new execution is spawned and is running when this returns.
    pub fn start(self: &Arc<Self>, name: &str) -> Result<(), RuntimeError> {
        let mut reg = self.lock();
        if reg.is_running(name) {
            drop(reg);
            debug!(task = name, "task already running, start ignored");
            self.bus
                .publish(Event::new(EventKind::DuplicateStart).with_task(name));
            return Ok(());
        }
        if reg.is_pending(name) {
            return Ok(());
        }
        if reg.loading {
            reg.enqueue(name);
            drop(reg);
            debug!(task = name, "start queued until the batch finishes");
            self.bus
                .publish(Event::new(EventKind::TaskQueued).with_task(name));
            return Ok(());
        }
        self.spawn_locked(&mut reg, name)
    }

    /// Spawns a fresh execution. Must be called with the registry lock held.
    fn spawn_locked(self: &Arc<Self>, reg: &mut Registry, name: &str) -> Result<(), RuntimeError> {
        let task = reg.definition(name).ok_or_else(|| RuntimeError::UnknownTask {
            name: name.to_string(),
        })?;
        let token = CancellationToken::new();
        let (id, reaped) = reg.insert_running(name, token.clone());
        if let Some(reaped) = reaped {
            self.publish_reaped(&reaped);
        }

        let name: Arc<str> = Arc::from(name);
        debug!(task = %name, handle = id, "starting task");
        self.bus.publish(
            Event::new(EventKind::TaskStarting)
                .with_task(name.clone())
                .with_handle(id),
        );
        tokio::spawn(runner::run_execution(
            Arc::clone(self),
            task,
            name,
            id,
            token,
        ));
        Ok(())
    }

    /// Defines `task` and starts it, unless `paused` is set or a batch is
    /// loading; in both cases it is only defined.
    pub fn define_and_start(
        self: &Arc<Self>,
        task: TaskRef,
        paused: bool,
    ) -> Result<(), RuntimeError> {
        let name = task.name().to_string();
        self.define(task);
        if paused || self.lock().loading {
            return Ok(());
        }
        self.start(&name)
    }

    /// Runs `task`'s body inline in the caller without registering it.
    ///
    /// The body gets its own context and feed ledger; feeds it leaves open are
    /// released in reverse order when it ends. It is invisible to `kill` and the
    /// queries, and nothing stops it except its own return.
    pub async fn execute(self: &Arc<Self>, task: TaskRef) -> Result<TaskValue, TaskError> {
        self.execute_with(task, CancellationToken::new()).await
    }

    pub(crate) async fn execute_with(
        self: &Arc<Self>,
        task: TaskRef,
        token: CancellationToken,
    ) -> Result<TaskValue, TaskError> {
        let name: Arc<str> = Arc::from(task.name());
        let ledger = FeedLedger::new(name.clone(), Arc::clone(&self.vehicle), self.bus.clone());
        let ctx = TaskContext::new(name.clone(), token, Arc::clone(self), ledger.clone());

        debug!(task = %name, "executing inline");
        let outcome = AssertUnwindSafe(task.run(ctx)).catch_unwind().await;
        let swept = ledger.sweep();
        if swept > 0 {
            warn!(task = %name, swept, "released feeds left open by an inline body");
        }
        outcome.unwrap_or_else(|panic_err| std::panic::resume_unwind(panic_err))
    }

    /// Starts `name` and waits until it is neither queued nor running.
    ///
    /// Returns `true` only if the execution completed; `false` when it was
    /// killed or failed.
    pub async fn run_and_wait(self: &Arc<Self>, name: &str) -> Result<bool, RuntimeError> {
        self.start(name)?;
        let poll = self.cfg.wait_poll();
        loop {
            match self.state(name) {
                Some(TaskState::Queued | TaskState::Running) => time::sleep(poll).await,
                Some(TaskState::Completed) => return Ok(true),
                _ => return Ok(false),
            }
        }
    }

    /// Requests cancellation of `name`. Fire-and-forget.
    ///
    /// A queued name is dropped from the queue and recorded as killed. Killing
    /// an absent task is reported as a diagnostic, not an error.
    pub fn kill(&self, name: &str) {
        let mut reg = self.lock();
        if let Some(token) = reg.running_token(name) {
            token.cancel();
            drop(reg);
            debug!(task = name, "kill requested");
            self.bus
                .publish(Event::new(EventKind::KillRequested).with_task(name));
            return;
        }
        if reg.remove_pending(name) {
            let stale = reg.record_exit(name, TaskExit::Killed);
            drop(reg);
            if let Some(stale) = stale {
                self.publish_reaped(&stale);
            }
            debug!(task = name, "queued start dropped by kill");
            self.bus.publish(
                Event::new(EventKind::TaskKilled)
                    .with_task(name)
                    .with_reason("killed while queued"),
            );
            return;
        }
        drop(reg);
        debug!(task = name, "kill of a task that is not running");
        self.bus
            .publish(Event::new(EventKind::KillOfAbsentTask).with_task(name));
    }

    /// Requests cancellation of every running task except `caller`.
    pub fn kill_all_except(&self, caller: &str) {
        let killed = self.lock().cancel_running(Some(caller));
        for name in &killed {
            self.bus.publish(
                Event::new(EventKind::KillRequested)
                    .with_task(name.as_str())
                    .with_reason(format!("requested by {caller}")),
            );
        }
        debug!(caller, killed = ?killed, "killed all other tasks");
    }

    /// True while `name` has an execution that has not reported its outcome.
    pub fn is_running(&self, name: &str) -> bool {
        self.lock().is_running(name)
    }

    /// True while `name` waits in the pending queue.
    pub fn is_queued(&self, name: &str) -> bool {
        self.lock().is_pending(name)
    }

    /// Current state of `name`, or `None` for a name never defined nor started.
    pub fn state(&self, name: &str) -> Option<TaskState> {
        self.lock().state(name)
    }

    /// Outcome of the most recent execution of `name`.
    ///
    /// `None` while it is queued or running, and for names that never ran.
    pub fn exit_status(&self, name: &str) -> Option<TaskExit> {
        self.lock().exit_status(name)
    }

    /// Names with a running execution, sorted.
    pub fn running(&self) -> Vec<String> {
        self.lock().running()
    }

    /// Queued names in start order.
    pub fn pending(&self) -> Vec<String> {
        self.lock().pending()
    }

    /// Registered definition names, sorted.
    pub fn defined(&self) -> Vec<String> {
        self.lock().defined()
    }

    /// Runs `loader` in batch-load mode: every `start` issued while it runs is
    /// queued, so a family of definitions can reference each other before any
    /// of them begins.
    ///
    /// Rejects reentry with [`RuntimeError::BatchInProgress`]. The mode ends
    /// however the loader ends; a loader panic is resumed afterwards. If the
    /// supervisory loop is active the queue is drained right away, otherwise it
    /// waits for [`run`](Self::run).
    pub async fn load_definitions<F, Fut, T>(self: &Arc<Self>, loader: F) -> Result<T, RuntimeError>
    where
        F: FnOnce(Arc<Supervisor>) -> Fut,
        Fut: Future<Output = T>,
    {
        {
            let mut reg = self.lock();
            if reg.loading {
                warn!("definition batch already in progress");
                return Err(RuntimeError::BatchInProgress);
            }
            reg.loading = true;
        }
        debug!("definition batch started");
        self.bus.publish(Event::new(EventKind::BatchStarted));

        let sup = Arc::clone(self);
        let outcome = AssertUnwindSafe(async move { loader(sup).await })
            .catch_unwind()
            .await;

        let drain = {
            let mut reg = self.lock();
            reg.loading = false;
            reg.looping && reg.has_pending()
        };

        match outcome {
            Ok(value) => {
                debug!(drain, "definition batch finished");
                self.bus.publish(Event::new(EventKind::BatchFinished));
                if drain {
                    self.drain_pending().await;
                }
                Ok(value)
            }
            Err(panic_err) => {
                let msg = panic_message(panic_err.as_ref());
                error!(panic = %msg, "definition loader panicked");
                self.bus.publish(
                    Event::new(EventKind::BatchFinished)
                        .with_reason(format!("loader panicked: {msg}")),
                );
                std::panic::resume_unwind(panic_err)
            }
        }
    }

    /// Runs the supervisory loop until no task is running or queued.
    ///
    /// Queued starts are issued first, `start_spacing` apart. Then every
    /// completion (or at the latest every `reap_interval`) triggers a reap pass.
    /// With `handle_signals`, an OS termination signal turns into
    /// [`shutdown`](Self::shutdown).
    pub async fn run(self: &Arc<Self>) -> Result<(), RuntimeError> {
        {
            let mut reg = self.lock();
            if reg.looping {
                return Err(RuntimeError::AlreadyRunning);
            }
            reg.looping = true;
        }
        let _looping = LoopGuard { sup: self };
        info!("supervisory loop started");

        let handle_signals = self.cfg.handle_signals;
        let signal = async move {
            if !handle_signals || shutdown::wait_for_shutdown_signal().await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        tokio::pin!(signal);

        loop {
            self.drain_pending().await;
            self.reap();
            if self.is_idle() {
                break;
            }
            select! {
                _ = self.exited.notified() => {}
                _ = time::sleep(self.cfg.reap_interval()) => {}
                _ = &mut signal => {
                    debug!("termination signal received");
                    return self.shutdown().await;
                }
            }
        }
        info!("supervisory loop finished");
        Ok(())
    }

    /// Kills every task, drops queued starts and waits up to `grace` for the
    /// running ones to reach a checkpoint.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] naming the tasks still running.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        let (killed, stale) = {
            let mut reg = self.lock();
            let stale: Vec<Reaped> = reg
                .clear_pending()
                .iter()
                .filter_map(|name| reg.record_exit(name, TaskExit::Killed))
                .collect();
            (reg.cancel_running(None), stale)
        };
        for r in &stale {
            self.publish_reaped(r);
        }
        for name in &killed {
            self.bus.publish(
                Event::new(EventKind::KillRequested)
                    .with_task(name.as_str())
                    .with_reason("shutdown"),
            );
        }
        debug!(killed = ?killed, grace = ?self.cfg.grace, "shutting down");

        let all_stopped = async {
            loop {
                self.reap();
                if !self.lock().has_running() {
                    break;
                }
                select! {
                    _ = self.exited.notified() => {}
                    _ = time::sleep(self.cfg.reap_interval()) => {}
                }
            }
        };

        let grace = self.cfg.grace;
        match time::timeout(grace, all_stopped).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_elapsed) => {
                let stuck = self.running();
                debug!(stuck = ?stuck, "grace period exceeded");
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Records the outcome of an execution and wakes the main loop.
    pub(crate) fn finish(&self, name: &str, id: u64, exit: TaskExit) {
        if self.lock().finish(name, id, exit) {
            self.exited.notify_one();
        }
    }

    /// Issues queued starts in FIFO order, `start_spacing` apart.
    /// Stops early if a new batch begins.
    async fn drain_pending(self: &Arc<Self>) {
        let mut first = true;
        loop {
            if !first {
                if !self.lock().has_pending() {
                    break;
                }
                time::sleep(self.cfg.start_spacing).await;
            }
            first = false;

            let mut reg = self.lock();
            if reg.loading {
                break;
            }
            let Some(name) = reg.pop_pending() else {
                break;
            };
            if let Err(e) = self.spawn_locked(&mut reg, &name) {
                drop(reg);
                error!(task = %name, error = %e, "queued start failed");
            }
        }
    }

    /// Removes every terminal handle from the live set. Safe to call repeatedly.
    fn reap(&self) -> usize {
        let reaped = self.lock().reap();
        for r in &reaped {
            self.publish_reaped(r);
        }
        reaped.len()
    }

    fn publish_reaped(&self, r: &Reaped) {
        debug!(task = %r.name, handle = r.id, state = ?r.exit.state(), "reaped");
        self.bus.publish(
            Event::new(EventKind::TaskReaped)
                .with_task(r.name.as_str())
                .with_handle(r.id),
        );
    }

    fn is_idle(&self) -> bool {
        let reg = self.lock();
        reg.is_idle() && !reg.loading
    }

    /// Subscribes to the bus and forwards events to the subscriber set.
    pub(crate) fn subscriber_listener(&self) {
        if self.subs.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the loop flag however `run` ends.
struct LoopGuard<'a> {
    sup: &'a Supervisor,
}

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        self.sup.lock().looping = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::clock::ManualClock;
    use crate::tasks::{Task, TaskFn};
    use crate::telemetry::FeedSpec;
    use crate::testkit::RecordingVehicle;

    const STEP: Duration = Duration::from_millis(100);

    fn supervisor() -> (Arc<Supervisor>, Arc<RecordingVehicle>, Arc<ManualClock>) {
        let vehicle = RecordingVehicle::new();
        let clock = Arc::new(ManualClock::default());
        let cfg = SupervisorConfig {
            handle_signals: false,
            grace: Duration::from_secs(2),
            ..SupervisorConfig::default()
        };
        let sup = Supervisor::builder(vehicle.clone(), clock.clone())
            .with_config(cfg)
            .build();
        (sup, vehicle, clock)
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn count(events: &[Event], kind: EventKind, task: &str) -> usize {
        events
            .iter()
            .filter(|e| e.kind == kind && e.task.as_deref() == Some(task))
            .count()
    }

    /// Paces forever; only a kill ends it.
    struct Forever(&'static str);

    #[async_trait]
    impl Task for Forever {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self, ctx: TaskContext) -> Result<TaskValue, TaskError> {
            loop {
                ctx.pace(STEP).await?;
            }
        }
    }

    /// Opens two feeds in nested scopes, then paces forever.
    struct Holder;

    #[async_trait]
    impl Task for Holder {
        fn name(&self) -> &str {
            "holder"
        }

        async fn run(&self, ctx: TaskContext) -> Result<TaskValue, TaskError> {
            let _outer = ctx.acquire(&[FeedSpec::new("s1")])?;
            let _inner = ctx.acquire(&[FeedSpec::new("s2")])?;
            loop {
                ctx.pace(STEP).await?;
            }
        }
    }

    /// Ignores cancellation entirely.
    struct Stubborn;

    #[async_trait]
    impl Task for Stubborn {
        fn name(&self) -> &str {
            "stubborn"
        }

        async fn run(&self, _ctx: TaskContext) -> Result<TaskValue, TaskError> {
            time::sleep(Duration::from_secs(3600)).await;
            Ok(TaskValue::Unit)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_creates_exactly_one_handle() {
        let (sup, _, _) = supervisor();
        let mut rx = sup.events();
        sup.define(Arc::new(Forever("a")));

        sup.start("a").expect("start");
        assert!(sup.is_running("a"));
        sup.start("a").expect("second start is not an error");

        assert_eq!(sup.running(), vec!["a"]);
        let events = drain(&mut rx);
        assert_eq!(count(&events, EventKind::TaskStarting, "a"), 1);
        assert_eq!(count(&events, EventKind::DuplicateStart, "a"), 1);

        sup.kill("a");
        time::sleep(STEP * 2).await;
        assert!(!sup.is_running("a"));
    }

    #[tokio::test]
    async fn test_start_unknown_task_fails() {
        let (sup, _, _) = supervisor();
        let err = sup.start("ghost").unwrap_err();
        assert_eq!(
            err,
            RuntimeError::UnknownTask {
                name: "ghost".into()
            }
        );
        assert_eq!(sup.state("ghost"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_stops_task_at_next_checkpoint() {
        let (sup, _, _) = supervisor();
        sup.define(Arc::new(Forever("a")));
        sup.start("a").expect("start");
        sup.kill("a");

        time::sleep(STEP).await;
        assert!(!sup.is_running("a"));
        assert_eq!(sup.exit_status("a"), Some(TaskExit::Killed));
        assert_eq!(sup.state("a"), Some(TaskState::Killed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_killed_task_releases_feeds_in_reverse() {
        let (sup, vehicle, _) = supervisor();
        sup.define(Arc::new(Holder));
        sup.start("holder").expect("start");
        time::sleep(STEP * 3).await;
        assert_eq!(vehicle.open_feeds(), 2);

        sup.kill("holder");
        time::sleep(STEP).await;

        assert_eq!(vehicle.closed(), vec!["s2", "s1"]);
        assert_eq!(vehicle.open_feeds(), 0);
        assert_eq!(sup.exit_status("holder"), Some(TaskExit::Killed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_and_wait_reports_only_completion() {
        let (sup, _, _) = supervisor();
        sup.define(TaskFn::arc("ok", |ctx: TaskContext| async move {
            ctx.pace(STEP).await?;
            Ok::<_, TaskError>(true)
        }));
        sup.define(TaskFn::arc("broken", |_ctx: TaskContext| async move {
            Err::<(), _>(TaskError::fail("no target docking port"))
        }));
        sup.define(Arc::new(Forever("endless")));

        assert!(sup.run_and_wait("ok").await.expect("ok"));
        assert_eq!(
            sup.exit_status("ok"),
            Some(TaskExit::Completed(TaskValue::Bool(true)))
        );

        assert!(!sup.run_and_wait("broken").await.expect("broken"));
        match sup.exit_status("broken") {
            Some(TaskExit::Failed(diag)) => {
                assert_eq!(diag.label, "task_failed");
                assert!(diag.message.contains("no target docking port"));
            }
            other => panic!("unexpected exit: {other:?}"),
        }

        let killer = {
            let sup = sup.clone();
            tokio::spawn(async move {
                time::sleep(Duration::from_secs(1)).await;
                sup.kill("endless");
            })
        };
        assert!(!sup.run_and_wait("endless").await.expect("endless"));
        killer.await.expect("killer");
        assert_eq!(sup.exit_status("endless"), Some(TaskExit::Killed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_body_fails_without_disturbing_siblings() {
        let (sup, _, _) = supervisor();
        sup.define(Arc::new(Forever("sibling")));
        sup.define(TaskFn::arc("bomb", |_ctx: TaskContext| async move {
            if true {
                panic!("staging sequence corrupted");
            }
            Ok::<_, TaskError>(())
        }));
        sup.start("sibling").expect("sibling");

        assert!(!sup.run_and_wait("bomb").await.expect("bomb"));
        match sup.exit_status("bomb") {
            Some(TaskExit::Failed(diag)) => {
                assert_eq!(diag.label, "task_panicked");
                assert_eq!(diag.message, "staging sequence corrupted");
            }
            other => panic!("unexpected exit: {other:?}"),
        }
        assert!(sup.is_running("sibling"));
        sup.kill("sibling");
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_defers_starts_until_run() {
        let (sup, _, _) = supervisor();

        let started = sup
            .load_definitions(|sup| async move {
                sup.define(Arc::new(Forever("x")));
                sup.start("x")?;
                sup.start("y")?;
                sup.start("x")?;
                sup.define(Arc::new(Forever("y")));
                assert!(!sup.is_running("x"));
                assert!(!sup.is_running("y"));
                Ok::<_, RuntimeError>(sup.pending())
            })
            .await
            .expect("batch")
            .expect("loader");
        assert_eq!(started, vec!["x", "y"]);
        assert_eq!(sup.pending(), vec!["x", "y"]);
        assert_eq!(sup.state("x"), Some(TaskState::Queued));

        let looping = {
            let sup = sup.clone();
            tokio::spawn(async move { sup.run().await })
        };
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sup.running(), vec!["x", "y"]);
        assert!(sup.pending().is_empty());

        sup.kill_all_except("");
        looping.await.expect("join").expect("run");
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_drains_immediately_when_loop_active() {
        let (sup, _, _) = supervisor();
        sup.define(Arc::new(Forever("keeper")));
        sup.start("keeper").expect("keeper");
        let looping = {
            let sup = sup.clone();
            tokio::spawn(async move { sup.run().await })
        };
        time::sleep(STEP).await;

        sup.load_definitions(|sup| async move {
            sup.define(Arc::new(Forever("x")));
            sup.define(Arc::new(Forever("y")));
            sup.start("x").expect("x");
            sup.start("y").expect("y");
            assert_eq!(sup.running(), vec!["keeper"]);
        })
        .await
        .expect("batch");

        assert_eq!(sup.running(), vec!["keeper", "x", "y"]);
        sup.shutdown().await.expect("shutdown");
        looping.await.expect("join").expect("run");
    }

    #[tokio::test]
    async fn test_batch_reentry_is_rejected() {
        let (sup, _, _) = supervisor();
        let nested = sup
            .load_definitions(|sup| async move { sup.load_definitions(|_| async {}).await })
            .await
            .expect("outer batch");
        assert_eq!(nested, Err(RuntimeError::BatchInProgress));
    }

    #[tokio::test]
    async fn test_loader_panic_clears_batch_mode() {
        let (sup, _, _) = supervisor();
        let res = AssertUnwindSafe(sup.load_definitions(|_| async {
            panic!("bad definition file");
        }))
        .catch_unwind()
        .await;
        assert!(res.is_err());

        sup.define(TaskFn::arc("after", |_ctx: TaskContext| async {
            Ok::<_, TaskError>(())
        }));
        sup.load_definitions(|_| async {}).await.expect("batch");
        sup.start("after").expect("start");
        assert!(!sup.is_queued("after"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_all_except_spares_caller() {
        let (sup, _, _) = supervisor();
        sup.define(Arc::new(Forever("launch")));
        sup.define(Arc::new(Forever("ascent")));
        sup.define(TaskFn::arc("reentry", |ctx: TaskContext| async move {
            ctx.kill_others();
            ctx.pace(STEP * 5).await?;
            Ok::<_, TaskError>("chutes armed")
        }));
        sup.start("launch").expect("launch");
        sup.start("ascent").expect("ascent");

        assert!(sup.run_and_wait("reentry").await.expect("reentry"));
        assert_eq!(sup.exit_status("launch"), Some(TaskExit::Killed));
        assert_eq!(sup.exit_status("ascent"), Some(TaskExit::Killed));
        assert_eq!(
            sup.exit_status("reentry"),
            Some(TaskExit::Completed(TaskValue::Text("chutes armed".into())))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_redefine_does_not_touch_running_handle() {
        let (sup, _, _) = supervisor();
        sup.define(Arc::new(Forever("burn")));
        sup.start("burn").expect("start");

        sup.define(TaskFn::arc("burn", |_ctx: TaskContext| async {
            Ok::<_, TaskError>(2.0)
        }));
        time::sleep(STEP * 3).await;
        assert!(sup.is_running("burn"));

        sup.kill("burn");
        time::sleep(STEP).await;
        assert!(sup.run_and_wait("burn").await.expect("rerun"));
        assert_eq!(
            sup.exit_status("burn"),
            Some(TaskExit::Completed(TaskValue::Number(2.0)))
        );
    }

    #[tokio::test]
    async fn test_kill_queued_name_drops_it() {
        let (sup, _, _) = supervisor();
        sup.load_definitions(|sup| async move {
            sup.define(Arc::new(Forever("x")));
            sup.start("x").expect("queue");
            sup.kill("x");
            assert!(!sup.is_queued("x"));
        })
        .await
        .expect("batch");

        assert!(sup.pending().is_empty());
        assert_eq!(sup.exit_status("x"), Some(TaskExit::Killed));
    }

    #[tokio::test]
    async fn test_kill_of_absent_task_is_diagnostic() {
        let (sup, _, _) = supervisor();
        let mut rx = sup.events();
        sup.kill("nobody");
        let events = drain(&mut rx);
        assert_eq!(count(&events, EventKind::KillOfAbsentTask, "nobody"), 1);
    }

    #[tokio::test]
    async fn test_run_returns_when_nothing_to_do() {
        let (sup, _, _) = supervisor();
        sup.run().await.expect("run");
        sup.run().await.expect("loop flag cleared");
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_is_rejected() {
        let (sup, _, _) = supervisor();
        sup.define(Arc::new(Forever("keeper")));
        sup.start("keeper").expect("keeper");
        let looping = {
            let sup = sup.clone();
            tokio::spawn(async move { sup.run().await })
        };
        time::sleep(STEP).await;

        assert_eq!(sup.run().await, Err(RuntimeError::AlreadyRunning));
        sup.kill("keeper");
        looping.await.expect("join").expect("run");
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_reaps_terminal_handle_inline() {
        let (sup, _, _) = supervisor();
        let mut rx = sup.events();
        sup.define(TaskFn::arc("probe", |_ctx: TaskContext| async {
            Ok::<_, TaskError>(())
        }));
        sup.start("probe").expect("first");
        time::sleep(STEP).await;
        assert!(!sup.is_running("probe"));

        sup.start("probe").expect("second");
        let events = drain(&mut rx);
        assert_eq!(count(&events, EventKind::TaskReaped, "probe"), 1);
        assert_eq!(count(&events, EventKind::TaskStarting, "probe"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_kills_everything_within_grace() {
        let (sup, _, _) = supervisor();
        let mut rx = sup.events();
        sup.define(Arc::new(Forever("a")));
        sup.define(Arc::new(Forever("b")));
        sup.start("a").expect("a");
        sup.start("b").expect("b");

        sup.shutdown().await.expect("shutdown");
        assert!(sup.running().is_empty());
        assert!(drain(&mut rx)
            .iter()
            .any(|e| e.kind == EventKind::AllStoppedWithin));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_reports_stuck_tasks() {
        let (sup, _, _) = supervisor();
        sup.define(Arc::new(Stubborn));
        sup.define(Arc::new(Forever("polite")));
        sup.start("stubborn").expect("stubborn");
        sup.start("polite").expect("polite");

        match sup.shutdown().await {
            Err(RuntimeError::GraceExceeded { stuck, .. }) => {
                assert_eq!(stuck, vec!["stubborn"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(sup.exit_status("polite"), Some(TaskExit::Killed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_follows_dilation() {
        let (sup, _, clock) = supervisor();
        clock.set_dilation(4.0);
        sup.define(TaskFn::arc("coast", |ctx: TaskContext| async move {
            ctx.pace(Duration::from_secs(8)).await?;
            Ok::<_, TaskError>(())
        }));

        let started = time::Instant::now();
        assert!(sup.run_and_wait("coast").await.expect("coast"));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(2300), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_task_releases_feeds_in_reverse() {
        let (sup, vehicle, _) = supervisor();
        sup.define(TaskFn::arc("faulty", |ctx: TaskContext| async move {
            let _outer = ctx.acquire(&[FeedSpec::new("s1")])?;
            let _inner = ctx.acquire(&[FeedSpec::new("s2")])?;
            ctx.pace(STEP).await?;
            Err::<(), _>(TaskError::fail("gimbal lock"))
        }));

        assert!(!sup.run_and_wait("faulty").await.expect("faulty"));
        assert_eq!(vehicle.closed(), vec!["s2", "s1"]);
        assert_eq!(vehicle.open_feeds(), 0);
        assert_eq!(sup.state("faulty"), Some(TaskState::Failed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicked_task_releases_feeds_in_reverse() {
        let (sup, vehicle, _) = supervisor();
        sup.define(TaskFn::arc("unstable", |ctx: TaskContext| async move {
            let _outer = ctx.acquire(&[FeedSpec::new("s1")])?;
            let _inner = ctx.acquire(&[FeedSpec::new("s2")])?;
            ctx.pace(STEP).await?;
            if true {
                panic!("rapid unplanned disassembly");
            }
            Ok::<_, TaskError>(())
        }));

        assert!(!sup.run_and_wait("unstable").await.expect("unstable"));
        assert_eq!(vehicle.closed(), vec!["s2", "s1"]);
        assert_eq!(vehicle.open_feeds(), 0);
        match sup.exit_status("unstable") {
            Some(TaskExit::Failed(diag)) => assert_eq!(diag.label, "task_panicked"),
            other => panic!("unexpected exit: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_queued_name_replaces_unreaped_exit() {
        let (sup, _, _) = supervisor();
        let mut rx = sup.events();
        sup.define(TaskFn::arc("orbit", |_ctx: TaskContext| async {
            Ok::<_, TaskError>(())
        }));
        sup.start("orbit").expect("first run");
        time::sleep(STEP).await;
        assert!(matches!(sup.exit_status("orbit"), Some(TaskExit::Completed(_))));

        sup.load_definitions(|sup| async move {
            sup.start("orbit").expect("queue");
            sup.kill("orbit");
        })
        .await
        .expect("batch");

        assert_eq!(sup.exit_status("orbit"), Some(TaskExit::Killed));
        sup.run().await.expect("run");
        assert_eq!(sup.exit_status("orbit"), Some(TaskExit::Killed));
        let events = drain(&mut rx);
        assert_eq!(count(&events, EventKind::TaskReaped, "orbit"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_define_and_start_respects_paused_and_batch() {
        let (sup, _, _) = supervisor();
        sup.define_and_start(Arc::new(Forever("live")), false)
            .expect("live");
        sup.define_and_start(Arc::new(Forever("parked")), true)
            .expect("parked");
        sup.load_definitions(|sup| async move {
            sup.define_and_start(Arc::new(Forever("loaded")), false)
        })
        .await
        .expect("batch")
        .expect("loaded");

        assert_eq!(sup.running(), vec!["live"]);
        assert!(sup.pending().is_empty());
        assert_eq!(sup.state("parked"), Some(TaskState::Defined));
        assert_eq!(sup.state("loaded"), Some(TaskState::Defined));
        assert_eq!(sup.defined(), vec!["live", "loaded", "parked"]);
        sup.kill("live");
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_runs_inline_and_sweeps_feeds() {
        let (sup, vehicle, _) = supervisor();
        let body = TaskFn::arc("survey", |ctx: TaskContext| async move {
            let feeds = ctx.acquire(&[FeedSpec::new("s1"), FeedSpec::new("s2")])?;
            ctx.pace(STEP).await?;
            std::mem::forget(feeds);
            Ok::<_, TaskError>(42.0)
        });

        let value = sup.execute(body).await.expect("execute");
        assert_eq!(value, TaskValue::Number(42.0));
        assert_eq!(vehicle.closed(), vec!["s2", "s1"]);
        assert_eq!(sup.state("survey"), None);
        assert!(sup.running().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_body_is_killed_with_its_caller() {
        let (sup, _, _) = supervisor();
        sup.define(TaskFn::arc("explorer", |ctx: TaskContext| async move {
            ctx.execute(Arc::new(Forever("scan"))).await?;
            Ok::<_, TaskError>(())
        }));
        sup.start("explorer").expect("start");
        time::sleep(STEP * 3).await;
        assert!(sup.is_running("explorer"));

        sup.kill("explorer");
        time::sleep(STEP).await;
        assert_eq!(sup.exit_status("explorer"), Some(TaskExit::Killed));
    }
}
