//! Access to the signals of the host simulation: motors the FMUs can drive and sensors the FMUs
//! can read.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

/// Identifier of a motor or a sensor in the host simulation.
pub type SignalId = u64;

/// The host simulation's signal namespace.
///
/// Motors and sensors live in separate namespaces; a name may be known as both.
pub trait HostSignals: Send + Sync {
    /// Id of the motor called `name`, if any.
    fn motor_id(&self, name: &str) -> Option<SignalId>;

    /// Id of the sensor called `name`, if any.
    fn sensor_id(&self, name: &str) -> Option<SignalId>;

    /// Latest reading of a sensor. `None` if the sensor has no value (yet).
    fn sensor_value(&self, id: SignalId) -> Option<f64>;

    /// Command a motor.
    fn set_motor_value(&self, id: SignalId, value: f64);
}

#[derive(Debug, Default)]
struct Signals {
    motor_ids: HashMap<String, SignalId>,
    sensor_ids: HashMap<String, SignalId>,
    motor_values: HashMap<SignalId, f64>,
    sensor_values: HashMap<SignalId, f64>,
    next_id: SignalId,
}

/// An in-memory [`HostSignals`] implementation.
///
/// Ids are handed out from 1 upwards, shared between motors and sensors.
#[derive(Debug, Default)]
pub struct SignalTable {
    inner: Mutex<Signals>,
}

impl SignalTable {
    fn lock(&self) -> std::sync::MutexGuard<'_, Signals> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_motor(&self, name: &str) -> SignalId {
        let mut signals = self.lock();
        signals.next_id += 1;
        let id = signals.next_id;
        signals.motor_ids.insert(name.to_owned(), id);
        id
    }

    pub fn add_sensor(&self, name: &str) -> SignalId {
        let mut signals = self.lock();
        signals.next_id += 1;
        let id = signals.next_id;
        signals.sensor_ids.insert(name.to_owned(), id);
        id
    }

    pub fn set_sensor_value(&self, id: SignalId, value: f64) {
        self.lock().sensor_values.insert(id, value);
    }

    /// Last value commanded to a motor.
    pub fn motor_value(&self, id: SignalId) -> Option<f64> {
        self.lock().motor_values.get(&id).copied()
    }
}

impl HostSignals for SignalTable {
    fn motor_id(&self, name: &str) -> Option<SignalId> {
        self.lock().motor_ids.get(name).copied()
    }

    fn sensor_id(&self, name: &str) -> Option<SignalId> {
        self.lock().sensor_ids.get(name).copied()
    }

    fn sensor_value(&self, id: SignalId) -> Option<f64> {
        self.lock().sensor_values.get(&id).copied()
    }

    fn set_motor_value(&self, id: SignalId, value: f64) {
        self.lock().motor_values.insert(id, value);
    }
}
