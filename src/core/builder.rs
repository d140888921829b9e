//! # Supervisor builder.
//!
//! Collects the collaborators (vehicle, clock), the configuration and the
//! event subscribers, then wires them into an `Arc<Supervisor>`.

use std::sync::Arc;

use crate::clock::Clock;
use crate::core::{SupervisorConfig, supervisor::Supervisor};
use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::telemetry::Vehicle;

/// Builder returned by [`Supervisor::builder`].
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    vehicle: Arc<dyn Vehicle>,
    clock: Arc<dyn Clock>,
}

impl SupervisorBuilder {
    pub(crate) fn new(vehicle: Arc<dyn Vehicle>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cfg: SupervisorConfig::default(),
            subscribers: Vec::new(),
            vehicle,
            clock,
        }
    }

    /// Replaces the default configuration.
    pub fn with_config(mut self, cfg: SupervisorConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Each subscriber gets a dedicated worker with a bounded queue; a slow or
    /// panicking subscriber never blocks the supervisor.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor.
    ///
    /// Must be called from within a tokio runtime: subscriber workers and the
    /// bus listener are spawned here.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));

        let sup = Arc::new(Supervisor::new_internal(
            self.cfg,
            bus,
            subs,
            self.vehicle,
            self.clock,
        ));
        sup.subscriber_listener();
        sup
    }
}
