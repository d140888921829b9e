//! # Scoped telemetry subscriptions.
//!
//! A [`Subscription`] is one open feed; it closes the feed when dropped. A
//! [`FeedSet`] groups the subscriptions acquired together and drops them
//! **last to first**, so nested scopes unwind in strict reverse acquisition
//! order on every exit path (return, `?` on cancellation, panic unwinding).
//!
//! Every execution owns a [`FeedLedger`] recording which feed ids are still
//! open. When the execution ends the runner calls [`FeedLedger::sweep`], which
//! releases whatever escaped its scope (e.g. a subscription moved into a
//! detached future) in reverse order, before the handle becomes terminal.
//!
//! ```text
//! acquire([a, b]) ──► open a ──► open b ──► FeedSet{a, b}
//!                                             │ drop
//!                                             ▼
//!                                  close b ──► close a
//! ```
//!
//! A feed is closed exactly once: whoever removes it from the ledger first
//! (the subscription's `Drop` or the sweep) closes it.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::VehicleError;
use crate::events::{Bus, Event, EventKind};
use crate::telemetry::vehicle::{FeedId, FeedSpec, Vehicle};

/// Per-execution record of open feeds.
pub(crate) struct FeedLedger {
    task: Arc<str>,
    vehicle: Arc<dyn Vehicle>,
    bus: Bus,
    open: Mutex<Vec<(FeedId, Arc<str>)>>,
}

impl FeedLedger {
    /// Creates an empty ledger for one execution of `task`.
    pub(crate) fn new(task: Arc<str>, vehicle: Arc<dyn Vehicle>, bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            task,
            vehicle,
            bus,
            open: Mutex::new(Vec::new()),
        })
    }

    /// Opens every feed in order. On failure the feeds opened so far are
    /// released in reverse order and the error is returned.
    pub(crate) fn acquire(self: &Arc<Self>, specs: &[FeedSpec]) -> Result<FeedSet, VehicleError> {
        let mut set = FeedSet {
            subs: Vec::with_capacity(specs.len()),
        };
        for spec in specs {
            set.subs.push(self.open_one(spec)?);
        }
        Ok(set)
    }

    fn open_one(self: &Arc<Self>, spec: &FeedSpec) -> Result<Subscription, VehicleError> {
        let id = self.vehicle.open_feed(spec)?;
        let name: Arc<str> = Arc::from(spec.name());
        self.lock().push((id, name.clone()));
        self.bus.publish(
            Event::new(EventKind::FeedOpened)
                .with_task(self.task.clone())
                .with_feed(name.clone()),
        );
        Ok(Subscription {
            id,
            name,
            ledger: Arc::clone(self),
        })
    }

    /// Number of feeds still open.
    pub fn open_count(&self) -> usize {
        self.lock().len()
    }

    /// Releases every feed still open, newest first. Returns how many were released.
    pub(crate) fn sweep(&self) -> usize {
        let leftovers: Vec<(FeedId, Arc<str>)> = {
            let mut open = self.lock();
            open.drain(..).rev().collect()
        };
        let n = leftovers.len();
        for (id, name) in leftovers {
            self.close(id, name, "sweep");
        }
        n
    }

    /// Removes `id` from the ledger and closes it, if still open.
    fn release(&self, id: FeedId) {
        let entry = {
            let mut open = self.lock();
            open.iter()
                .rposition(|(open_id, _)| *open_id == id)
                .map(|pos| open.remove(pos))
        };
        if let Some((id, name)) = entry {
            self.close(id, name, "scope");
        }
    }

    fn close(&self, id: FeedId, name: Arc<str>, via: &'static str) {
        self.vehicle.close_feed(id);
        self.bus.publish(
            Event::new(EventKind::FeedReleased)
                .with_task(self.task.clone())
                .with_feed(name)
                .with_reason(via),
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(FeedId, Arc<str>)>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One live telemetry feed. Closes the feed on drop.
pub struct Subscription {
    id: FeedId,
    name: Arc<str>,
    ledger: Arc<FeedLedger>,
}

impl Subscription {
    /// Reads the latest value of the feed.
    pub fn get(&self) -> Result<f64, VehicleError> {
        self.ledger.vehicle.read_feed(self.id)
    }

    /// Collaborator-assigned feed id.
    pub fn id(&self) -> FeedId {
        self.id
    }

    /// Feed name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.ledger.release(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Subscriptions acquired together; released in reverse order on drop.
#[derive(Debug)]
pub struct FeedSet {
    subs: Vec<Subscription>,
}

impl FeedSet {
    /// Returns the subscription at `index` (acquisition order).
    pub fn get(&self, index: usize) -> Option<&Subscription> {
        self.subs.get(index)
    }

    /// Reads the latest value of the subscription at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn value(&self, index: usize) -> Result<f64, VehicleError> {
        self.subs[index].get()
    }

    /// Iterates in acquisition order.
    pub fn iter(&self) -> std::slice::Iter<'_, Subscription> {
        self.subs.iter()
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }
}

impl std::ops::Index<usize> for FeedSet {
    type Output = Subscription;

    fn index(&self, index: usize) -> &Subscription {
        &self.subs[index]
    }
}

impl Drop for FeedSet {
    fn drop(&mut self) {
        while let Some(sub) = self.subs.pop() {
            drop(sub);
        }
    }
}
