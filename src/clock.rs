//! Lock-free time values shared between the master and its nodes, and the progress signal they
//! wait on.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Condvar, Mutex, PoisonError,
    },
    time::Duration,
};

use crate::config::WaitStrategy;

/// An `f64` that can be shared between threads, stored as its bit pattern.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release)
    }
}

/// The master's macro time plus a generation counter that is bumped whenever anything the
/// scheduler waits on has changed (a node finished a step, the master ticked, the host
/// advanced, a stop was requested).
#[derive(Debug)]
pub struct Clock {
    macro_time: AtomicF64,
    generation: Mutex<u64>,
    changed: Condvar,
    strategy: WaitStrategy,
    poll_interval: Duration,
}

impl Clock {
    pub fn new(strategy: WaitStrategy, poll_interval: Duration) -> Self {
        Self {
            macro_time: AtomicF64::new(0.0),
            generation: Mutex::new(0),
            changed: Condvar::new(),
            strategy,
            poll_interval,
        }
    }

    /// Current macro time in seconds.
    pub fn macro_time(&self) -> f64 {
        self.macro_time.load()
    }

    pub(crate) fn set_macro_time(&self, time: f64) {
        self.macro_time.store(time);
        self.notify();
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn generation(&self) -> u64 {
        *self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake everybody waiting in [`Clock::wait_for_change`].
    pub fn notify(&self) {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *generation = generation.wrapping_add(1);
        self.changed.notify_all();
    }

    /// Block until the generation differs from `seen`, for at most one poll interval.
    ///
    /// With [`WaitStrategy::Polling`] this is a plain sleep.
    pub fn wait_for_change(&self, seen: u64) {
        match self.strategy {
            WaitStrategy::Condvar => {
                let generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
                let _ = self
                    .changed
                    .wait_timeout_while(generation, self.poll_interval, |generation| {
                        *generation == seen
                    })
                    .unwrap_or_else(PoisonError::into_inner);
            }
            WaitStrategy::Polling => std::thread::sleep(self.poll_interval),
        }
    }
}
