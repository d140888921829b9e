//! In-memory vehicle used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::VehicleError;
use crate::telemetry::{Command, FeedId, FeedSpec, Vehicle};

#[derive(Debug, Clone, PartialEq)]
pub enum VehicleOp {
    Open(String),
    Close(String),
    Issue(String),
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    names: HashMap<FeedId, String>,
    values: HashMap<String, f64>,
    failing: HashSet<String>,
    ops: Vec<VehicleOp>,
}

/// Records every call; feeds read from a name → value table.
#[derive(Default)]
pub struct RecordingVehicle {
    inner: Mutex<Inner>,
}

impl RecordingVehicle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_value(&self, feed: &str, value: f64) {
        self.inner.lock().unwrap().values.insert(feed.to_string(), value);
    }

    pub fn fail_feed(&self, feed: &str) {
        self.inner.lock().unwrap().failing.insert(feed.to_string());
    }

    pub fn ops(&self) -> Vec<VehicleOp> {
        self.inner.lock().unwrap().ops.clone()
    }

    pub fn closed(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                VehicleOp::Close(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn issued(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                VehicleOp::Issue(cmd) => Some(cmd),
                _ => None,
            })
            .collect()
    }

    pub fn open_feeds(&self) -> usize {
        self.inner.lock().unwrap().names.len()
    }
}

impl Vehicle for RecordingVehicle {
    fn open_feed(&self, spec: &FeedSpec) -> Result<FeedId, VehicleError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing.contains(spec.name()) {
            return Err(VehicleError::FeedUnavailable {
                feed: spec.name().to_string(),
            });
        }
        inner.next_id += 1;
        let id = FeedId(inner.next_id);
        inner.names.insert(id, spec.name().to_string());
        inner.ops.push(VehicleOp::Open(spec.name().to_string()));
        Ok(id)
    }

    fn close_feed(&self, id: FeedId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(name) = inner.names.remove(&id) {
            inner.ops.push(VehicleOp::Close(name));
        }
    }

    fn read_feed(&self, id: FeedId) -> Result<f64, VehicleError> {
        let inner = self.inner.lock().unwrap();
        let name = inner.names.get(&id).ok_or(VehicleError::Disconnected)?;
        Ok(inner.values.get(name).copied().unwrap_or_default())
    }

    fn issue(&self, command: &Command) -> Result<(), VehicleError> {
        self.inner
            .lock()
            .unwrap()
            .ops
            .push(VehicleOp::Issue(command.to_string()));
        Ok(())
    }
}
