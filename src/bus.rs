//! The publish/subscribe data bus shared by the host simulation, the nodes and the master.
//!
//! A channel is addressed by a `group` and a `name`. Nodes publish to `<group>/<instance>`
//! and read commands from `<group>/cmd/<instance>`; the master publishes its clock to
//! `<group>/simTimer`.
//!
//! Host time never travels over the bus. It only enters through `FmuMaster::update`, and the
//! master writes `simTimer` but does not read it back.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

/// Channel name the master publishes its clock on.
pub const SIM_TIMER: &str = "simTimer";

/// Entry of [`SIM_TIMER`] holding the macro time in seconds.
pub const CURRENT_TIME: &str = "currentTime";

/// Name of the channel a node reads its inputs from.
pub fn command_channel(instance_name: &str) -> String {
    format!("cmd/{instance_name}")
}

/// An ordered list of named values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataPackage {
    entries: Vec<(String, f64)>,
}

impl DataPackage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, replacing the value of an existing entry with the same name.
    pub fn add(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| *value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for DataPackage {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        let mut package = DataPackage::new();
        for (name, value) in iter {
            package.add(name, value);
        }
        package
    }
}

/// Producer/receiver contract of the data bus.
pub trait DataBus: Send + Sync {
    /// Publish `package` on `group/name`, replacing the previous package.
    fn push_data(&self, group: &str, name: &str, package: DataPackage);

    /// The latest package on `group/name`, if anything was published.
    fn get_data(&self, group: &str, name: &str) -> Option<DataPackage>;

    /// Remove the channel `group/name`.
    fn unregister(&self, group: &str, name: &str);
}

#[derive(Debug, Default)]
struct Channel {
    package: DataPackage,
    pushes: u64,
}

/// An in-memory [`DataBus`] that keeps the latest package per channel and counts pushes.
#[derive(Debug, Default)]
pub struct MemoryBus {
    channels: Mutex<HashMap<(String, String), Channel>>,
}

impl MemoryBus {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Channel>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of packages pushed to `group/name` since it was (re-)registered.
    pub fn push_count(&self, group: &str, name: &str) -> u64 {
        self.lock()
            .get(&(group.to_owned(), name.to_owned()))
            .map_or(0, |channel| channel.pushes)
    }

    /// All registered channels as `group/name`, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .lock()
            .keys()
            .map(|(group, name)| format!("{group}/{name}"))
            .collect();
        names.sort();
        names
    }
}

impl DataBus for MemoryBus {
    fn push_data(&self, group: &str, name: &str, package: DataPackage) {
        let mut channels = self.lock();
        let channel = channels
            .entry((group.to_owned(), name.to_owned()))
            .or_default();
        channel.package = package;
        channel.pushes += 1;
    }

    fn get_data(&self, group: &str, name: &str) -> Option<DataPackage> {
        self.lock()
            .get(&(group.to_owned(), name.to_owned()))
            .map(|channel| channel.package.clone())
    }

    fn unregister(&self, group: &str, name: &str) {
        self.lock().remove(&(group.to_owned(), name.to_owned()));
    }
}
