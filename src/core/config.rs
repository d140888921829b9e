//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`], the centralized settings for one supervisor instance.
//!
//! ## Sentinel values
//! - `pacing_slice = 0s` → clamped to 1ms (a slice must make progress)
//! - `bus_capacity = 0` → clamped to 1
//! - `wait_poll = 0s` / `reap_interval = 0s` → clamped to 1ms

use std::time::Duration;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `reap_interval`: upper bound between two reap passes of the main loop
/// - `start_spacing`: pause between two queued starts while draining
/// - `wait_poll`: polling interval of `run_and_wait`
/// - `pacing_slice`: longest real-time sleep before the dilation factor is re-read
/// - `grace`: how long shutdown waits for killed tasks to reach a checkpoint
/// - `bus_capacity`: event bus ring buffer size
/// - `handle_signals`: whether `run` reacts to SIGINT/SIGTERM/SIGQUIT (Ctrl-C)
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Upper bound between reap passes; completions also wake the loop directly.
    pub reap_interval: Duration,

    /// Pause inserted between queued starts to avoid a start storm.
    pub start_spacing: Duration,

    /// How often `run_and_wait` re-checks the awaited task.
    pub wait_poll: Duration,

    /// Longest single real-time sleep inside `pace`.
    ///
    /// Smaller slices react faster to dilation changes and kills.
    pub pacing_slice: Duration,

    /// Maximum time to wait, after a shutdown request, for killed tasks to stop.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// React to OS termination signals inside `run`.
    pub handle_signals: bool,
}

impl SupervisorConfig {
    #[inline]
    pub fn reap_interval(&self) -> Duration {
        self.reap_interval.max(MIN_INTERVAL)
    }

    #[inline]
    pub fn wait_poll(&self) -> Duration {
        self.wait_poll.max(MIN_INTERVAL)
    }

    #[inline]
    pub fn pacing_slice(&self) -> Duration {
        self.pacing_slice.max(MIN_INTERVAL)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `reap_interval = 100ms`
    /// - `start_spacing = 100ms`
    /// - `wait_poll = 250ms`
    /// - `pacing_slice = 50ms`
    /// - `grace = 10s`
    /// - `bus_capacity = 1024`
    /// - `handle_signals = true`
    fn default() -> Self {
        Self {
            reap_interval: Duration::from_millis(100),
            start_spacing: Duration::from_millis(100),
            wait_poll: Duration::from_millis(250),
            pacing_slice: Duration::from_millis(50),
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
            handle_signals: true,
        }
    }
}
