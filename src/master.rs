//! The scheduler that gates the host simulation against the progress of all nodes.
//!
//! The master ticks a macro clock in steps of the GCD of all node step sizes. It only ticks
//! while the host is at least one macro step ahead and every active node has caught up with
//! the current macro time; after each tick the nodes due at the new time step on their own
//! threads. [`FmuMaster::update`] advances host time and blocks until the macro clock has
//! caught up with it again.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::{
    binding::FmuBinding,
    built_info,
    bus::{self, DataBus, DataPackage},
    clock::Clock,
    config::{CosimConfig, ModelConfig, WaitStrategy},
    host::HostSignals,
    node::{FmuNode, NodeContext, NodeHealth},
    step_size::{self, TIME_EPSILON},
    Error, ErrorKind,
};

#[derive(Debug, Default)]
struct MasterState {
    /// Host simulation time in seconds.
    host_time: f64,
    /// Macro ticks since start or the last reset.
    ticks: u64,
    /// Set while the host is a macro step or more ahead of the macro clock.
    wait: bool,
    /// Last tick whose node outputs have been published.
    published_tick: Option<u64>,
    paused: bool,
}

struct Scheduler {
    nodes: Vec<FmuNode>,
    intervals: Vec<u64>,
    step_size: Option<f64>,
    state: Mutex<MasterState>,
    /// Signalled when `wait` is cleared.
    host_cv: Condvar,
    clock: Arc<Clock>,
    bus: Arc<dyn DataBus>,
    group: String,
    stop: AtomicBool,
    strategy: WaitStrategy,
    poll_interval: Duration,
    timeout: Option<Duration>,
    fail_fast: bool,
}

impl Scheduler {
    fn lock(&self) -> MutexGuard<'_, MasterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One pass of the scheduling loop. Returns `true` if the macro clock advanced.
    fn tick_once(&self) -> bool {
        let Some(step) = self.step_size else {
            return false;
        };
        let mut state = self.lock();
        if state.paused {
            return false;
        }

        let macro_time = self.clock.macro_time();
        if !self.nodes.iter().all(|node| node.caught_up(macro_time)) {
            return false;
        }

        if state.published_tick != Some(state.ticks) {
            for (node, interval) in self.nodes.iter().zip(&self.intervals) {
                if state.ticks % interval == 0 {
                    node.publish();
                }
            }
            state.published_tick = Some(state.ticks);
        }

        if state.host_time - macro_time >= step - TIME_EPSILON {
            state.ticks += 1;
            let macro_time = state.ticks as f64 * step;
            self.clock.set_macro_time(macro_time);
            self.bus.push_data(
                &self.group,
                bus::SIM_TIMER,
                [(bus::CURRENT_TIME, macro_time)].into_iter().collect::<DataPackage>(),
            );
            log::trace!("Macro tick {} at {macro_time}s", state.ticks);
            return true;
        }

        if state.wait {
            state.wait = false;
            self.host_cv.notify_all();
        }
        false
    }

    fn run(&self) {
        log::debug!("Scheduler started");
        while !self.stop.load(Ordering::Acquire) {
            let seen = self.clock.generation();
            if !self.tick_once() {
                self.clock.wait_for_change(seen);
            }
        }
        log::debug!("Scheduler stopped");
    }

    /// Block while the host is ahead of the macro clock.
    fn wait_for_nodes(&self) -> Result<(), Error> {
        let deadline = self.timeout.map(|timeout| (Instant::now() + timeout, timeout));
        let mut state = self.lock();
        while state.wait && !self.stop.load(Ordering::Acquire) {
            let wait_for = match deadline {
                Some((deadline, timeout)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Error::Timeout(timeout));
                    }
                    (deadline - now).min(self.poll_interval)
                }
                None => self.poll_interval,
            };
            state = match self.strategy {
                WaitStrategy::Condvar => {
                    self.host_cv
                        .wait_timeout(state, wait_for)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                WaitStrategy::Polling => {
                    drop(state);
                    thread::sleep(wait_for);
                    self.lock()
                }
            };
        }
        Ok(())
    }
}

/// Owns all nodes and drives them from the host simulation's update cycle.
pub struct FmuMaster {
    inner: Arc<Scheduler>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for FmuMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FmuMaster")
            .field("nodes", &self.inner.nodes)
            .field("step_size", &self.inner.step_size)
            .field("intervals", &self.inner.intervals)
            .finish()
    }
}

impl FmuMaster {
    /// Load every configured FMU and start the scheduler.
    pub fn new(
        config: &CosimConfig,
        host: Arc<dyn HostSignals>,
        bus: Arc<dyn DataBus>,
    ) -> Result<Self, Error> {
        let tmp_root = config.scheduler.tmp_root()?;
        Self::with_loader(config, host, bus, |model| {
            FmuBinding::load(&model.fmu_path, &model.instance_name, &tmp_root)
        })
    }

    /// Like [`FmuMaster::new`], obtaining each model's binding from `load`.
    ///
    /// A model that is misconfigured, fails to load or fails to initialize is skipped in
    /// best-effort mode; in fail-fast mode, or if a worker thread cannot be started, the error is
    /// returned.
    pub fn with_loader<F>(
        config: &CosimConfig,
        host: Arc<dyn HostSignals>,
        bus: Arc<dyn DataBus>,
        mut load: F,
    ) -> Result<Self, Error>
    where
        F: FnMut(&ModelConfig) -> Result<FmuBinding, Error>,
    {
        config.validate()?;
        let scheduler = &config.scheduler;
        let ctx = NodeContext::new(host, bus.clone(), scheduler.clone());

        let mut nodes = Vec::new();
        for model in config.models() {
            let node = model
                .validate()
                .and_then(|()| load(model))
                .and_then(|binding| FmuNode::with_binding(binding, model, &ctx));
            match node {
                Ok(node) => nodes.push(node),
                Err(err) if scheduler.fail_fast() || err.kind() == ErrorKind::Threading => {
                    return Err(err)
                }
                Err(err) => log::error!("Skipping FMU {}: {err}", model.instance_name),
            }
        }

        let step_sizes: Vec<f64> = nodes.iter().map(FmuNode::step_size).collect();
        let step_size = step_size::compute_step_size(&step_sizes);
        let intervals = step_size
            .map(|step| step_size::update_intervals(&step_sizes, step))
            .unwrap_or_default();

        log::info!(
            "{} {}: {} FMU nodes, macro step size {step_size:?}, update intervals {intervals:?}",
            built_info::PKG_NAME,
            built_info::PKG_VERSION,
            nodes.len(),
        );

        let inner = Arc::new(Scheduler {
            nodes,
            intervals,
            step_size,
            state: Mutex::new(MasterState::default()),
            host_cv: Condvar::new(),
            clock: ctx.clock.clone(),
            bus,
            group: scheduler.group.clone(),
            stop: AtomicBool::new(false),
            strategy: scheduler.wait_strategy,
            poll_interval: scheduler.poll_interval(),
            timeout: scheduler.timeout(),
            fail_fast: scheduler.fail_fast(),
        });

        let handle = match step_size {
            Some(_) => {
                let scheduler = inner.clone();
                let handle = thread::Builder::new()
                    .name("fmu-master".to_owned())
                    .spawn(move || scheduler.run())
                    .map_err(|source| Error::Spawn {
                        name: "fmu-master".to_owned(),
                        source,
                    })?;
                Some(handle)
            }
            None => {
                log::warn!("No FMU nodes, the master stays idle");
                None
            }
        };

        Ok(Self { inner, handle })
    }

    /// The macro step size, `None` without nodes.
    pub fn step_size(&self) -> Option<f64> {
        self.inner.step_size
    }

    /// Macro ticks between publications of each node, in node order.
    pub fn update_intervals(&self) -> &[u64] {
        &self.inner.intervals
    }

    pub fn nodes(&self) -> &[FmuNode] {
        &self.inner.nodes
    }

    pub fn macro_time(&self) -> f64 {
        self.inner.clock.macro_time()
    }

    pub fn host_time(&self) -> f64 {
        self.inner.lock().host_time
    }

    /// Whether the host is waiting for the nodes to catch up.
    pub fn get_wait(&self) -> bool {
        self.inner.lock().wait
    }

    pub fn health(&self) -> Vec<NodeHealth> {
        self.inner.nodes.iter().map(FmuNode::health).collect()
    }

    /// Advance host time by `dt_ms` milliseconds and block until every node has caught up.
    ///
    /// Fails with [`Error::Timeout`] if a timeout is configured and expires first; the
    /// co-simulation keeps running and a later call picks up from there. A NaN, infinite or
    /// negative `dt_ms` is rejected without touching host time.
    pub fn update(&self, dt_ms: f64) -> Result<(), Error> {
        if !(dt_ms.is_finite() && dt_ms >= 0.0) {
            return Err(Error::Config(format!(
                "host time step must be finite and non-negative, got {dt_ms} ms"
            )));
        }
        let inner = &self.inner;
        {
            let mut state = inner.lock();
            state.host_time += dt_ms / 1000.0;
            let Some(step) = inner.step_size else {
                return Ok(());
            };
            state.wait = state.host_time - inner.clock.macro_time() >= step - TIME_EPSILON;
        }
        inner.clock.notify();
        inner.wait_for_nodes()
    }

    /// Rewind the co-simulation to time zero: host and macro clocks, the wait flag and every
    /// node, which re-initializes its model.
    pub fn reset(&self) -> Result<(), Error> {
        let inner = &self.inner;
        inner.lock().paused = true;
        inner.clock.set_macro_time(0.0);

        let mut first_error = None;
        for node in &inner.nodes {
            if let Err(err) = node.request_reset(inner.timeout) {
                log::error!("Reset of {} failed: {err}", node.instance_name());
                if inner.fail_fast || err.kind() == ErrorKind::Timeout {
                    first_error.get_or_insert(err);
                }
            }
        }

        {
            let mut state = inner.lock();
            *state = MasterState::default();
            inner.host_cv.notify_all();
        }
        inner.clock.notify();
        log::info!("Co-simulation reset");
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for FmuMaster {
    fn drop(&mut self) {
        self.inner.stop.store(true, Ordering::Release);
        self.inner.clock.notify();
        self.inner.host_cv.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{}", Error::ThreadPanicked("fmu-master".to_owned()));
            }
        }

        match Arc::get_mut(&mut self.inner) {
            // Nodes are torn down in order, each waiting for its worker before freeing its model.
            Some(inner) => inner.nodes.clear(),
            None => log::warn!("Scheduler still shared, nodes are torn down on last release"),
        }
        self.inner.bus.unregister(&self.inner.group, bus::SIM_TIMER);
    }
}
