//! A node steps one FMU on its own worker thread, following the master's macro clock.
//!
//! The worker steps whenever the node's target time has been reached by the macro time, and
//! otherwise sleeps on the shared [`Clock`]. Teardown sets a stop flag, polls until the worker
//! has left its loop and only then frees the model, so the native instance is never freed while
//! a step is in flight.

use std::{
    sync::{atomic::Ordering, Arc},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::{
    binding::FmuBinding,
    bus::{self, DataBus},
    clock::Clock,
    config::{ModelConfig, SchedulerConfig},
    host::HostSignals,
    resolver::VariableBinding,
    Error,
};

mod shared;
mod stepping;

pub use shared::{NodeHealth, NodeStatus};
pub use stepping::NodeCore;

use shared::NodeShared;

/// What a node needs from its surroundings.
#[derive(Clone)]
pub struct NodeContext {
    pub host: Arc<dyn HostSignals>,
    pub bus: Arc<dyn DataBus>,
    pub clock: Arc<Clock>,
    pub config: SchedulerConfig,
}

impl NodeContext {
    /// A context with its own clock, for nodes that are not driven by an
    /// [`FmuMaster`](crate::FmuMaster).
    pub fn new(host: Arc<dyn HostSignals>, bus: Arc<dyn DataBus>, config: SchedulerConfig) -> Self {
        let clock = Arc::new(Clock::new(config.wait_strategy, config.poll_interval()));
        Self {
            host,
            bus,
            clock,
            config,
        }
    }
}

/// Marks the worker as gone when the loop exits, also when it unwinds.
struct RunningGuard<'a>(&'a NodeShared, &'a Clock);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set_status(NodeStatus::Finished);
        self.0.running.store(false, Ordering::Release);
        self.1.notify();
    }
}

fn run(mut core: NodeCore, clock: Arc<Clock>) -> NodeCore {
    let shared = core.shared.clone();
    let _guard = RunningGuard(&shared, &clock);
    log::debug!("Worker of {} started", shared.instance);

    while !shared.stop.load(Ordering::Acquire) {
        if shared.reset_requested.load(Ordering::Acquire) {
            let outcome = core.reset().err();
            shared.finish_reset(outcome);
            clock.notify();
            continue;
        }

        let seen = clock.generation();
        if core.is_due(clock.macro_time()) {
            // Failures are logged by the binding and recorded in the node's health.
            let _ = core.step();
            clock.notify();
        } else {
            clock.wait_for_change(seen);
        }
    }

    log::debug!("Worker of {} stopped", shared.instance);
    core
}

/// One FMU stepped on a dedicated thread.
pub struct FmuNode {
    shared: Arc<NodeShared>,
    handle: Option<JoinHandle<NodeCore>>,
    bus: Arc<dyn DataBus>,
    clock: Arc<Clock>,
    group: String,
    teardown_poll: Duration,
}

impl std::fmt::Debug for FmuNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FmuNode")
            .field("instance", &self.shared.instance)
            .field("step_size", &self.shared.step_size)
            .field("status", &self.shared.status())
            .finish()
    }
}

impl FmuNode {
    /// Load the FMU of `model`, initialize it and start its worker.
    pub fn new(model: &ModelConfig, ctx: &NodeContext) -> Result<Self, Error> {
        let binding = FmuBinding::load(
            &model.fmu_path,
            &model.instance_name,
            ctx.config.tmp_root()?,
        )?;
        Self::with_binding(binding, model, ctx)
    }

    /// Like [`FmuNode::new`], for an already loaded model.
    pub fn with_binding(
        binding: FmuBinding,
        model: &ModelConfig,
        ctx: &NodeContext,
    ) -> Result<Self, Error> {
        let core = NodeCore::new(binding, model, ctx)?;
        Self::spawn(core, ctx)
    }

    /// Start the worker thread of `core`.
    pub fn spawn(core: NodeCore, ctx: &NodeContext) -> Result<Self, Error> {
        let shared = core.shared.clone();
        let name = format!("fmu-{}", shared.instance);
        shared.running.store(true, Ordering::Release);

        let clock = ctx.clock.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(core, clock))
            .map_err(|source| {
                shared.running.store(false, Ordering::Release);
                Error::Spawn { name, source }
            })?;

        Ok(Self {
            shared,
            handle: Some(handle),
            bus: ctx.bus.clone(),
            clock: ctx.clock.clone(),
            group: ctx.config.group.clone(),
            teardown_poll: ctx.config.teardown_poll(),
        })
    }

    pub fn instance_name(&self) -> &str {
        &self.shared.instance
    }

    pub fn step_size(&self) -> f64 {
        self.shared.step_size
    }

    pub fn local_time(&self) -> f64 {
        self.shared.local_time()
    }

    /// The time the next step advances to. Never decreases between resets.
    pub fn target_time(&self) -> f64 {
        self.shared.target_time()
    }

    pub fn status(&self) -> NodeStatus {
        self.shared.status()
    }

    pub fn health(&self) -> NodeHealth {
        self.shared.health()
    }

    pub fn bindings(&self) -> &[VariableBinding] {
        &self.shared.bindings
    }

    /// Whether the node has stepped up to `macro_time`, or no longer steps at all.
    pub(crate) fn caught_up(&self, macro_time: f64) -> bool {
        !self.shared.status().is_active()
            || self.shared.target_time() > macro_time + crate::step_size::TIME_EPSILON
    }

    pub(crate) fn publish(&self) {
        self.shared.publish(self.bus.as_ref(), &self.group);
    }

    /// Ask the worker to re-initialize its model and wait until it has.
    pub fn request_reset(&self, timeout: Option<Duration>) -> Result<(), Error> {
        if !self.shared.running.load(Ordering::Acquire) {
            log::warn!("{}: not running, reset skipped", self.shared.instance);
            return Ok(());
        }
        let deadline = timeout.map(|timeout| (Instant::now() + timeout, timeout));
        self.shared.reset_requested.store(true, Ordering::Release);
        self.clock.notify();

        loop {
            let seen = self.clock.generation();
            if !self.shared.reset_requested.load(Ordering::Acquire)
                || !self.shared.running.load(Ordering::Acquire)
            {
                break;
            }
            if let Some((deadline, timeout)) = deadline {
                if Instant::now() >= deadline {
                    return Err(Error::Timeout(timeout));
                }
            }
            self.clock.wait_for_change(seen);
        }

        self.shared.take_reset_outcome().map_or(Ok(()), Err)
    }

    /// Stop the worker, free the model and unregister the node's channels.
    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.shared.stop.store(true, Ordering::Release);
        self.clock.notify();
        while self.shared.running.load(Ordering::Acquire) {
            thread::sleep(self.teardown_poll);
        }

        match handle.join() {
            Ok(mut core) => core.destroy(),
            Err(_) => log::error!(
                "{}",
                Error::ThreadPanicked(format!("fmu-{}", self.shared.instance))
            ),
        }

        self.bus.unregister(&self.group, &self.shared.instance);
        self.bus
            .unregister(&self.group, &bus::command_channel(&self.shared.instance));
        log::info!("Destroyed FMU node {}", self.shared.instance);
    }
}

impl Drop for FmuNode {
    fn drop(&mut self) {
        self.shutdown();
    }
}
