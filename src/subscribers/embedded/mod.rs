//! # Built-in subscribers
//!
//! - [`LogWriter`]: renders events through `tracing` (requires the `logging` feature).

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
