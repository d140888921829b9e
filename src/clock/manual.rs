use std::sync::atomic::{AtomicU64, Ordering};

use super::Clock;

/// Externally adjustable clock.
///
/// Both values are stored as `f64` bit patterns in atomics, so any thread may
/// change the dilation factor while tasks are pacing.
///
/// # Example
/// ```
/// use flightvisor::{Clock, ManualClock};
///
/// let clock = ManualClock::new(0.0, 1.0);
/// clock.set_dilation(4.0);
/// clock.advance(10.0);
/// assert_eq!(clock.dilation(), 4.0);
/// assert_eq!(clock.now(), 10.0);
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicU64,
    dilation: AtomicU64,
}

impl ManualClock {
    pub fn new(now: f64, dilation: f64) -> Self {
        Self {
            now: AtomicU64::new(now.to_bits()),
            dilation: AtomicU64::new(dilation.to_bits()),
        }
    }

    pub fn set_dilation(&self, factor: f64) {
        self.dilation.store(factor.to_bits(), Ordering::Release);
    }

    pub fn set_now(&self, now: f64) {
        self.now.store(now.to_bits(), Ordering::Release);
    }

    /// Moves simulated time forward by `secs`.
    pub fn advance(&self, secs: f64) {
        let _ = self
            .now
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + secs).to_bits())
            });
    }
}

impl Default for ManualClock {
    /// Simulated time zero, real-time factor.
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.now.load(Ordering::Acquire))
    }

    fn dilation(&self) -> f64 {
        f64::from_bits(self.dilation.load(Ordering::Acquire))
    }
}
