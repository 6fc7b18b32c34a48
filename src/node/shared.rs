//! State a node shares with the master and other threads. Scalars are atomics; only the value
//! buffer and the error slots are behind a lock.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
    Mutex, MutexGuard, PoisonError,
};

use crate::{
    bus::DataBus,
    clock::AtomicF64,
    resolver::{Direction, VariableBinding},
    DataPackage, Error,
};

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeStatus {
    /// Waiting for the master to reach the node's target time.
    Idle = 0,
    /// Inside a step.
    Stepping = 1,
    /// The worker thread has exited.
    Finished = 2,
    /// A failure stopped the node; it is ignored by the scheduler until reset.
    Error = 3,
}

impl NodeStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => NodeStatus::Idle,
            1 => NodeStatus::Stepping,
            2 => NodeStatus::Finished,
            _ => NodeStatus::Error,
        }
    }

    /// Whether the scheduler has to wait for this node.
    pub fn is_active(self) -> bool {
        matches!(self, NodeStatus::Idle | NodeStatus::Stepping)
    }
}

/// Snapshot of a node's progress and failures.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeHealth {
    pub instance: String,
    pub status: NodeStatus,
    pub local_time: f64,
    pub target_time: f64,
    /// Completed steps since construction or the last reset.
    pub steps: u64,
    /// Failed steps since construction or the last reset.
    pub failed_steps: u64,
    pub last_error: Option<String>,
}

#[derive(Debug)]
pub(crate) struct NodeShared {
    pub instance: String,
    pub step_size: f64,
    pub bindings: Vec<VariableBinding>,
    status: AtomicU8,
    local_time: AtomicF64,
    target_time: AtomicF64,
    steps: AtomicU64,
    failed_steps: AtomicU64,
    /// Latest value of every binding, in binding order.
    values: Mutex<Vec<f64>>,
    last_error: Mutex<Option<String>>,
    pub stop: AtomicBool,
    pub running: AtomicBool,
    pub reset_requested: AtomicBool,
    reset_outcome: Mutex<Option<Error>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl NodeShared {
    pub fn new(instance: String, step_size: f64, bindings: Vec<VariableBinding>) -> Self {
        let values = vec![f64::NAN; bindings.len()];
        Self {
            instance,
            step_size,
            bindings,
            status: AtomicU8::new(NodeStatus::Idle as u8),
            local_time: AtomicF64::new(0.0),
            target_time: AtomicF64::new(step_size),
            steps: AtomicU64::new(0),
            failed_steps: AtomicU64::new(0),
            values: Mutex::new(values),
            last_error: Mutex::new(None),
            stop: AtomicBool::new(false),
            running: AtomicBool::new(false),
            reset_requested: AtomicBool::new(false),
            reset_outcome: Mutex::new(None),
        }
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: NodeStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub fn local_time(&self) -> f64 {
        self.local_time.load()
    }

    pub fn target_time(&self) -> f64 {
        self.target_time.load()
    }

    /// Publish the position after `steps` completed steps.
    pub fn set_progress(&self, steps: u64) {
        let local_time = steps as f64 * self.step_size;
        self.local_time.store(local_time);
        self.target_time.store(local_time + self.step_size);
    }

    pub fn count_step(&self) {
        self.steps.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_failure(&self, err: &Error) {
        self.failed_steps.fetch_add(1, Ordering::AcqRel);
        self.set_last_error(err);
    }

    pub fn set_last_error(&self, err: &Error) {
        *lock(&self.last_error) = Some(err.to_string());
    }

    /// Clear counters and diagnostics, as after a fresh initialization.
    pub fn clear(&self) {
        self.steps.store(0, Ordering::Release);
        self.failed_steps.store(0, Ordering::Release);
        *lock(&self.last_error) = None;
    }

    pub fn values(&self) -> MutexGuard<'_, Vec<f64>> {
        lock(&self.values)
    }

    pub fn finish_reset(&self, outcome: Option<Error>) {
        *lock(&self.reset_outcome) = outcome;
        self.reset_requested.store(false, Ordering::Release);
    }

    pub fn take_reset_outcome(&self) -> Option<Error> {
        lock(&self.reset_outcome).take()
    }

    pub fn health(&self) -> NodeHealth {
        NodeHealth {
            instance: self.instance.clone(),
            status: self.status(),
            local_time: self.local_time(),
            target_time: self.target_time(),
            steps: self.steps.load(Ordering::Acquire),
            failed_steps: self.failed_steps.load(Ordering::Acquire),
            last_error: lock(&self.last_error).clone(),
        }
    }

    /// The outputs and observed values as they would be published.
    pub fn package(&self) -> DataPackage {
        let values = self.values();
        self.bindings
            .iter()
            .zip(values.iter())
            .filter(|(binding, _)| binding.direction != Direction::Input)
            .map(|(binding, value)| (binding.key(), *value))
            .collect()
    }

    /// Push the current outputs and observed values to `<group>/<instance>`.
    pub fn publish(&self, bus: &dyn DataBus, group: &str) {
        bus.push_data(group, &self.instance, self.package());
    }
}
