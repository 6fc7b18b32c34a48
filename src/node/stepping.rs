use std::sync::Arc;

use super::{
    shared::{NodeShared, NodeStatus},
    NodeContext, NodeHealth,
};
use crate::{
    binding::FmuBinding,
    bus::{self, DataBus},
    config::{ErrorPolicy, ModelConfig},
    fmi2::binding::fmi2ValueReference,
    host::HostSignals,
    resolver::{Direction, HostSignal, Namespaces, VariableBinding},
    step_size::TIME_EPSILON,
    DataPackage, Error,
};

/// The stepping logic of one node, independent of the thread that drives it.
///
/// An [`FmuNode`](super::FmuNode) runs a `NodeCore` on its worker thread; single-threaded
/// embedders can drive one directly with [`NodeCore::step`] or [`NodeCore::step_simulation`].
pub struct NodeCore {
    binding: FmuBinding,
    pub(crate) shared: Arc<NodeShared>,
    host: Arc<dyn HostSignals>,
    bus: Arc<dyn DataBus>,
    group: String,
    commands: String,
    initial_values: Vec<(fmi2ValueReference, f64)>,
    relative_tolerance: f64,
    policy: ErrorPolicy,
    default_input: f64,
    step_count: u64,
}

impl std::fmt::Debug for NodeCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeCore")
            .field("instance", &self.shared.instance)
            .field("step_size", &self.shared.step_size)
            .field("step_count", &self.step_count)
            .field("binding", &self.binding)
            .finish()
    }
}

impl NodeCore {
    /// Resolve the declared variables of `model` against `binding` and the host, then run the
    /// initialization sequence.
    ///
    /// Unresolvable declarations are logged and skipped, unless the scheduler is configured to
    /// fail fast. The same holds for a failing initialization sequence: in best-effort mode the
    /// node is created anyway and the failure shows up in its health.
    pub fn new(binding: FmuBinding, model: &ModelConfig, ctx: &NodeContext) -> Result<Self, Error> {
        model.validate()?;
        let policy = ctx.config.error_policy;
        let instance = model.instance_name.clone();

        let host = ctx.host.as_ref();
        let motors = |name: &str| host.motor_id(name);
        let sensors = |name: &str| host.sensor_id(name);
        let fmu = |name: &str| binding.lookup(name);
        let resolution = Namespaces {
            motors: &motors,
            sensors: &sensors,
            fmu: &fmu,
        }
        .resolve_model(model);

        for err in resolution.failures {
            if policy == ErrorPolicy::FailFast {
                return Err(err);
            }
            log::warn!("{instance}: skipping declaration: {err}");
        }

        let mut initial_values = Vec::with_capacity(model.initial_values.len());
        for (name, value) in &model.initial_values {
            match binding.value_reference(name) {
                Ok(vr) => initial_values.push((vr, *value)),
                Err(err) if policy == ErrorPolicy::FailFast => return Err(err),
                Err(err) => log::warn!("{instance}: skipping initial value: {err}"),
            }
        }

        let shared = Arc::new(NodeShared::new(
            instance,
            model.step_size,
            resolution.bindings,
        ));
        let mut core = Self {
            binding,
            shared,
            host: ctx.host.clone(),
            bus: ctx.bus.clone(),
            group: ctx.config.group.clone(),
            commands: bus::command_channel(&model.instance_name),
            initial_values,
            relative_tolerance: model.relative_tolerance,
            policy,
            default_input: ctx.config.default_input,
            step_count: 0,
        };

        let initialized = core
            .binding
            .initialize(core.relative_tolerance, &core.initial_values, policy);
        if let Err(err) = initialized {
            if policy == ErrorPolicy::FailFast {
                return Err(err);
            }
            log::error!("{}: initialization incomplete: {err}", core.shared.instance);
            core.shared.set_last_error(&err);
        }
        core.refresh_values();

        log::info!(
            "Created FMU node {} (step size {}s, {} bound variables)",
            core.shared.instance,
            core.shared.step_size,
            core.shared.bindings.len()
        );
        Ok(core)
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

    /// The time the next step advances to.
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

    /// Read a variable straight from the model.
    pub fn value(&mut self, name: &str) -> Result<f64, Error> {
        let vr = self.binding.value_reference(name)?;
        self.binding.get_real(vr)
    }

    /// The outputs and observed values of the last completed step.
    pub fn package(&self) -> DataPackage {
        self.shared.package()
    }

    /// Push [`NodeCore::package`] to `<group>/<instance>`.
    pub fn publish(&self) {
        self.shared.publish(self.bus.as_ref(), &self.group);
    }

    /// Whether the node has to step to follow a master at `macro_time`.
    pub(crate) fn is_due(&self, macro_time: f64) -> bool {
        self.status().is_active() && self.target_time() <= macro_time + TIME_EPSILON
    }

    fn input_value(&self, binding: &VariableBinding, commands: Option<&DataPackage>) -> f64 {
        let value = match binding.host {
            Some(HostSignal::Sensor(id)) => self.host.sensor_value(id),
            _ => commands.and_then(|package| package.get(&binding.key())),
        };
        value
            .filter(|value| !value.is_nan())
            .unwrap_or(self.default_input)
    }

    /// Perform exactly one step of the node's step size: apply inputs, step the model, read back
    /// outputs and observed values and drive the bound motors.
    ///
    /// A failed step counts towards the node's `failed_steps` and keeps the previous outputs. In
    /// best-effort mode time advances regardless; in fail-fast mode the node goes to
    /// [`NodeStatus::Error`] and stops being scheduled.
    pub fn step(&mut self) -> Result<(), Error> {
        let shared = self.shared.clone();
        shared.set_status(NodeStatus::Stepping);

        let commands = self.bus.get_data(&self.group, &self.commands);
        let mut values = shared.values().clone();
        let mut failure = None;

        for (index, binding) in shared.bindings.iter().enumerate() {
            if binding.direction != Direction::Input {
                continue;
            }
            let value = self.input_value(binding, commands.as_ref());
            match self.binding.set_real(binding.vr, value) {
                Ok(_) => values[index] = value,
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }

        let stepped = match failure.take() {
            Some(err) if self.policy == ErrorPolicy::FailFast => Err(err),
            pending => {
                failure = pending;
                self.binding
                    .do_step(shared.local_time(), shared.step_size, true)
                    .map(|_| ())
            }
        };

        if stepped.is_ok() {
            for (index, binding) in shared.bindings.iter().enumerate() {
                if binding.direction == Direction::Input {
                    continue;
                }
                match self.binding.get_real(binding.vr) {
                    Ok(value) => {
                        values[index] = value;
                        if let Some(HostSignal::Motor(id)) = binding.host {
                            self.host.set_motor_value(id, value);
                        }
                    }
                    Err(err) => {
                        failure.get_or_insert(err);
                    }
                }
            }
            *shared.values() = values;
        }

        let advanced = stepped.is_ok() || self.policy == ErrorPolicy::BestEffort;
        let result = stepped.and(failure.map_or(Ok(()), Err));
        match &result {
            Ok(()) => {
                shared.count_step();
                shared.set_status(NodeStatus::Idle);
            }
            Err(err) if self.policy == ErrorPolicy::FailFast => {
                log::error!("{}: stopping after failed step: {err}", shared.instance);
                shared.record_failure(err);
                shared.set_status(NodeStatus::Error);
            }
            Err(err) => {
                shared.record_failure(err);
                shared.set_status(NodeStatus::Idle);
            }
        }

        // Progress goes last: the master treats the step as done once the target time moves.
        if advanced {
            self.step_count += 1;
            shared.set_progress(self.step_count);
        }
        result
    }

    /// Step repeatedly until local time reaches `up_to`, then rewind local time to zero.
    ///
    /// Returns the number of steps taken. Each host update is thereby translated into a whole
    /// number of steps of the node's own size.
    pub fn step_simulation(&mut self, up_to: f64) -> Result<u64, Error> {
        let mut steps = 0;
        while self.status().is_active() && self.local_time() < up_to - TIME_EPSILON {
            match self.step() {
                Err(err) if self.policy == ErrorPolicy::FailFast => return Err(err),
                _ => steps += 1,
            }
        }
        self.step_count = 0;
        self.shared.set_progress(0);
        Ok(steps)
    }

    /// Re-initialize the model and rewind the node to local time zero.
    ///
    /// Counters and diagnostics are cleared, initial values are applied again and the output
    /// buffers are re-read, so calling this twice in a row is the same as calling it once.
    pub fn reset(&mut self) -> Result<(), Error> {
        let result =
            self.binding
                .reset(self.relative_tolerance, &self.initial_values, self.policy);

        self.step_count = 0;
        self.shared.set_progress(0);
        self.shared.clear();
        match &result {
            Err(err) if self.policy == ErrorPolicy::FailFast => {
                self.shared.set_last_error(err);
                self.shared.set_status(NodeStatus::Error);
            }
            Err(err) => {
                log::error!("{}: reset incomplete: {err}", self.shared.instance);
                self.shared.set_last_error(err);
                self.shared.set_status(NodeStatus::Idle);
            }
            Ok(()) => self.shared.set_status(NodeStatus::Idle),
        }
        self.refresh_values();
        result
    }

    /// Re-read every bound variable into the value buffer. Unreadable values are left as they
    /// were.
    fn refresh_values(&mut self) {
        let shared = self.shared.clone();
        let mut values = shared.values().clone();
        for (index, binding) in shared.bindings.iter().enumerate() {
            if let Ok(value) = self.binding.get_real(binding.vr) {
                values[index] = value;
            }
        }
        *shared.values() = values;
    }

    /// Terminate and free the model.
    pub fn destroy(&mut self) {
        self.binding.destroy();
        self.shared.set_status(NodeStatus::Finished);
    }
}
