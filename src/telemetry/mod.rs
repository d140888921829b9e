//! # Telemetry and commands.
//!
//! - [`Vehicle`] the consumed collaborator contract (feeds + commands)
//! - [`Subscription`] / [`FeedSet`] scoped, reverse-ordered feed release

mod feed;
mod vehicle;

pub(crate) use feed::FeedLedger;
pub use feed::{FeedSet, Subscription};
pub use vehicle::{Command, FeedId, FeedSpec, Vehicle};
