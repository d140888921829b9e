//! # Example: Launch with abort watchdog
//!
//! Three tasks share one simulated vehicle:
//! - `launch`: throttles up, then waits (paced) for the ascent task to finish
//! - `ascent`: watches altitude and stages at 2 km
//! - `abort_watch`: reads a fault feed; when it trips, kills every other task
//!
//! Definitions are loaded as one batch so `launch` can reference `ascent`
//! before either starts. The simulation runs at 4x, set on the shared clock.
//!
//! ```text
//! RUST_LOG=info cargo run --example launch_abort
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flightvisor::{
    Clock, Command, FeedId, FeedSpec, LogWriter, ManualClock, Supervisor, SupervisorConfig,
    TaskContext, TaskError, TaskExit, TaskFn, Vehicle, VehicleError,
};
use tracing_subscriber::EnvFilter;

/// Toy vehicle: altitude grows with simulated time while the throttle is open.
struct SimVehicle {
    clock: Arc<ManualClock>,
    next_id: AtomicU64,
    feeds: Mutex<HashMap<FeedId, String>>,
    throttle: Mutex<f64>,
    fault_at: f64,
}

impl SimVehicle {
    fn new(clock: Arc<ManualClock>, fault_at: f64) -> Self {
        Self {
            clock,
            next_id: AtomicU64::new(1),
            feeds: Mutex::new(HashMap::new()),
            throttle: Mutex::new(0.0),
            fault_at,
        }
    }
}

impl Vehicle for SimVehicle {
    fn open_feed(&self, spec: &FeedSpec) -> Result<FeedId, VehicleError> {
        let id = FeedId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.feeds
            .lock()
            .unwrap()
            .insert(id, spec.name().to_string());
        Ok(id)
    }

    fn close_feed(&self, id: FeedId) {
        self.feeds.lock().unwrap().remove(&id);
    }

    fn read_feed(&self, id: FeedId) -> Result<f64, VehicleError> {
        let feeds = self.feeds.lock().unwrap();
        let name = feeds.get(&id).ok_or(VehicleError::Disconnected)?;
        let t = self.clock.now();
        match name.as_str() {
            "flight.mean_altitude" => Ok(t * 120.0 * *self.throttle.lock().unwrap()),
            "vessel.fault" => Ok(if t >= self.fault_at { 1.0 } else { 0.0 }),
            other => Err(VehicleError::FeedUnavailable {
                feed: other.to_string(),
            }),
        }
    }

    fn issue(&self, command: &Command) -> Result<(), VehicleError> {
        println!("[vehicle] {command}");
        if let Command::Set { control, value } = command {
            if control == "throttle" {
                *self.throttle.lock().unwrap() = *value;
            }
        }
        Ok(())
    }
}

fn define_flight(sup: &Arc<Supervisor>) {
    sup.define(TaskFn::arc("launch", |ctx: TaskContext| async move {
        ctx.command(&Command::set("throttle", 1.0))?;
        ctx.command(&Command::trigger("stage"))?;
        let staged = ctx.run_and_wait("ascent").await?;
        ctx.command(&Command::set("throttle", 0.0))?;
        Ok::<_, TaskError>(staged)
    }));

    sup.define(TaskFn::arc("ascent", |ctx: TaskContext| async move {
        let inner = ctx.clone();
        ctx.with_feeds(&[FeedSpec::new("flight.mean_altitude")], |feeds| async move {
            while feeds.value(0)? < 2_000.0 {
                inner.pace(Duration::from_secs(1)).await?;
            }
            inner.command(&Command::trigger("stage"))?;
            Ok::<_, TaskError>(())
        })
        .await
    }));

    sup.define(TaskFn::arc("abort_watch", |ctx: TaskContext| async move {
        let fault = ctx.acquire(&[FeedSpec::new("vessel.fault")])?;
        loop {
            if fault.value(0)? > 0.5 {
                println!("[abort_watch] fault detected at t={:.1}s", ctx.now());
                ctx.kill_others();
                ctx.command(&Command::set("throttle", 0.0))?;
                ctx.command(&Command::trigger("abort"))?;
                return Ok::<_, TaskError>("aborted");
            }
            if !ctx.is_running("launch") {
                return Ok("nominal");
            }
            ctx.pace(Duration::from_millis(500)).await?;
        }
    }));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let clock = Arc::new(ManualClock::new(0.0, 4.0));
    // Pass a fault time below ~17s to see the abort path.
    let vehicle = Arc::new(SimVehicle::new(clock.clone(), 30.0));

    let sim = {
        let clock = clock.clone();
        tokio::spawn(async move {
            let tick = Duration::from_millis(50);
            loop {
                tokio::time::sleep(tick).await;
                clock.advance(tick.as_secs_f64() * clock.dilation());
            }
        })
    };

    let cfg = SupervisorConfig {
        grace: Duration::from_secs(3),
        ..SupervisorConfig::default()
    };
    let sup = Supervisor::builder(vehicle, clock.clone())
        .with_config(cfg)
        .with_subscribers(vec![Arc::new(LogWriter::new())])
        .build();

    sup.load_definitions(|sup| async move {
        define_flight(&sup);
        sup.start("launch")?;
        sup.start("abort_watch")
    })
    .await??;

    sup.run().await?;
    sim.abort();

    for name in sup.defined() {
        match sup.exit_status(&name) {
            Some(TaskExit::Completed(value)) => println!("{name}: completed ({value})"),
            Some(TaskExit::Killed) => println!("{name}: killed"),
            Some(TaskExit::Failed(diag)) => println!("{name}: failed: {diag}"),
            None => println!("{name}: never ran"),
        }
    }
    Ok(())
}
