//! # Event subscribers for the flightvisor runtime.
//!
//! This module provides the [`Subscribe`] trait and built-in implementations
//! for observing runtime events broadcast through the [`Bus`](crate::Event).
//!
//! ## Architecture
//! ```text
//! Supervisor / executions ── publish(Event) ──► Bus ──► subscriber_listener
//!                                                            │
//!                                                            ▼
//!                                                      SubscriberSet::emit
//!                                                  ┌─────────┼─────────┐
//!                                                  ▼         ▼         ▼
//!                                              LogWriter  Metrics   Custom
//! ```

mod embedded;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
