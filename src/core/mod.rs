//! Runtime core: registry, executions and the supervisory loop.
//!
//! The public face of this module is [`Supervisor`] (built through
//! [`SupervisorBuilder`]) together with the lifecycle values it reports.
//!
//! Internal modules:
//! - [`registry`]: the locked state (definitions, live handles, queue, exits);
//! - [`runner`]: drives one execution to its terminal outcome;
//! - [`supervisor`]: start/kill/query, batch loading, the main loop, shutdown;
//! - [`shutdown`]: OS termination signals.

mod builder;
mod config;
mod lifecycle;
mod registry;
mod runner;
mod shutdown;
mod supervisor;

use std::any::Any;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use lifecycle::{Diagnostic, TaskExit, TaskState, TaskValue};
pub use supervisor::Supervisor;

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
