//! # Clock context and time-dilated pacing.
//!
//! The simulation may run faster (or slower) than wall-clock time. [`Clock`]
//! exposes the current simulated time and the **dilation factor** (simulated
//! seconds per real second); [`pace`] turns a requested simulated delay into
//! a real wait, re-reading the factor at every slice.
//!
//! ```text
//! pace(8s, slice=50ms)     factor 4.0 ─────────────► factor 1.0
//!   │ slice: read factor ──► sleep ≤ 50ms ──► credit elapsed × factor
//!   └ repeat until credited ≥ 8s (or cancelled → TaskError::Canceled)
//! ```

mod manual;
mod pacing;

pub use manual::ManualClock;
pub use pacing::pace;

/// Source of simulated time.
///
/// Implementations must be cheap to call: pacing reads the factor every slice.
pub trait Clock: Send + Sync + 'static {
    /// Current simulated time in seconds.
    fn now(&self) -> f64;

    /// Simulated seconds elapsing per real second (`1.0` = real time).
    fn dilation(&self) -> f64;
}

/// Clamps invalid factors (non-finite or not positive) to real time.
#[inline]
pub(crate) fn effective_dilation(raw: f64) -> f64 {
    if raw.is_finite() && raw > 0.0 { raw } else { 1.0 }
}
