//! # Vehicle-control collaborator boundary.
//!
//! The runtime never talks to a vehicle directly: it consumes the [`Vehicle`]
//! trait, implemented by whatever remote-control client the embedding program
//! uses. Feeds are identified by an opaque [`FeedId`] handed out by the collaborator.

use std::borrow::Cow;
use std::fmt;

use crate::error::VehicleError;

/// Collaborator-assigned identifier of an open telemetry feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedId(pub u64);

/// Description of a telemetry feed to open (e.g. `"flight.mean_altitude"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedSpec {
    name: Cow<'static, str>,
}

impl FeedSpec {
    /// Creates a feed description from its collaborator-specific name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the feed name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<&'static str> for FeedSpec {
    fn from(name: &'static str) -> Self {
        FeedSpec::new(name)
    }
}

/// A command sent to the vehicle.
///
/// Commands are fire-and-forget and are never interrupted by cancellation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Set a continuous control (throttle, pitch, rcs translation, ...).
    Set {
        /// Control name.
        control: Cow<'static, str>,
        /// New value.
        value: f64,
    },
    /// Trigger a discrete action (stage, deploy, engage autopilot, ...).
    Trigger {
        /// Action name.
        action: Cow<'static, str>,
    },
}

impl Command {
    /// Shorthand for [`Command::Set`].
    pub fn set(control: impl Into<Cow<'static, str>>, value: f64) -> Self {
        Command::Set {
            control: control.into(),
            value,
        }
    }

    /// Shorthand for [`Command::Trigger`].
    pub fn trigger(action: impl Into<Cow<'static, str>>) -> Self {
        Command::Trigger {
            action: action.into(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Set { control, value } => write!(f, "{control}={value}"),
            Command::Trigger { action } => write!(f, "{action}!"),
        }
    }
}

/// Remote vehicle-control collaborator.
///
/// All methods are synchronous: the collaborator is assumed to answer quickly
/// enough that no call needs to be cancelled midway. `close_feed` must be
/// infallible because it runs from `Drop`.
pub trait Vehicle: Send + Sync + 'static {
    /// Opens a live feed for the described measurement.
    fn open_feed(&self, spec: &FeedSpec) -> Result<FeedId, VehicleError>;

    /// Closes a feed previously returned by [`Vehicle::open_feed`].
    fn close_feed(&self, id: FeedId);

    /// Reads the latest value of an open feed.
    fn read_feed(&self, id: FeedId) -> Result<f64, VehicleError>;

    /// Issues a command.
    fn issue(&self, command: &Command) -> Result<(), VehicleError>;
}
