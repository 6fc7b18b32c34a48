//! One instantiated FMU, with its variable table and native handle lifecycle.

use std::{collections::HashMap, path::Path};

use crate::{
    config::ErrorPolicy,
    fmi2::{binding::fmi2ValueReference, import::Fmi2Import, Fmi2Error, Fmi2Res},
    traits::CoSimulation,
    Error,
};

/// Wraps one Co-Simulation model and owns its native handle.
///
/// Every FMI call is converted into a `Result`: a non-OK status is logged here and returned as
/// [`Error::Abi`], nothing is retried. After [`FmuBinding::destroy`] every call fails with
/// [`Error::Freed`].
pub struct FmuBinding {
    name: String,
    variables: HashMap<String, fmi2ValueReference>,
    instance: Option<Box<dyn CoSimulation + Send>>,
}

impl std::fmt::Debug for FmuBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FmuBinding")
            .field("name", &self.name)
            .field("variables", &self.variables.len())
            .field("freed", &self.instance.is_none())
            .finish()
    }
}

impl FmuBinding {
    /// Extract, validate and instantiate the FMU at `path`.
    ///
    /// The archive is extracted into a fresh `<tmp_root>/<instance_name>_<random>` directory that
    /// lives as long as the binding.
    pub fn load(
        path: impl AsRef<Path>,
        instance_name: &str,
        tmp_root: impl AsRef<Path>,
    ) -> Result<Self, Error> {
        let import = Fmi2Import::from_path(path, tmp_root, instance_name)?;
        let variables = import.real_value_references();

        let logging_on = log::log_enabled!(log::Level::Debug);
        let instance = import.instantiate_cs(instance_name, false, logging_on)?;
        instance.check_consistency()?;
        log::debug!("Loaded {instance:?}");

        Ok(Self::from_instance(instance_name, variables, Box::new(instance)))
    }

    /// Wrap an already instantiated model.
    pub fn from_instance(
        name: impl Into<String>,
        variables: HashMap<String, fmi2ValueReference>,
        instance: Box<dyn CoSimulation + Send>,
    ) -> Self {
        Self {
            name: name.into(),
            variables,
            instance: Some(instance),
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.name
    }

    /// Case-sensitive lookup of a variable's value reference.
    pub fn value_reference(&self, name: &str) -> Result<fmi2ValueReference, Error> {
        self.variables
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownVariable {
                name: name.to_owned(),
            })
    }

    /// Lookup without an error, for use as a resolver namespace.
    pub fn lookup(&self, name: &str) -> Option<fmi2ValueReference> {
        self.variables.get(name).copied()
    }

    pub fn is_freed(&self) -> bool {
        self.instance.is_none()
    }

    fn call<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut (dyn CoSimulation + Send)) -> Result<T, Fmi2Error>,
    ) -> Result<T, Error> {
        let instance = self
            .instance
            .as_deref_mut()
            .ok_or_else(|| Error::Freed(self.name.clone()))?;
        f(instance).map_err(|source| {
            log::error!("{operation} failed for {}: {source}", self.name);
            Error::Abi {
                instance: self.name.clone(),
                operation,
                source,
            }
        })
    }

    pub fn set_real(&mut self, vr: fmi2ValueReference, value: f64) -> Result<Fmi2Res, Error> {
        self.call("fmi2SetReal", |inst| inst.set_real(&[vr], &[value]))
    }

    pub fn get_real(&mut self, vr: fmi2ValueReference) -> Result<f64, Error> {
        let mut value = [0.0];
        self.call("fmi2GetReal", |inst| inst.get_real(&[vr], &mut value))?;
        Ok(value[0])
    }

    pub fn setup_experiment(&mut self, tolerance: f64, start_time: f64) -> Result<Fmi2Res, Error> {
        self.call("fmi2SetupExperiment", |inst| {
            inst.setup_experiment(Some(tolerance), start_time, None)
        })
    }

    pub fn enter_initialization_mode(&mut self) -> Result<Fmi2Res, Error> {
        self.call("fmi2EnterInitializationMode", |inst| {
            inst.enter_initialization_mode()
        })
    }

    pub fn exit_initialization_mode(&mut self) -> Result<Fmi2Res, Error> {
        self.call("fmi2ExitInitializationMode", |inst| {
            inst.exit_initialization_mode()
        })
    }

    /// Advance the model by exactly `step_size`. Never retried.
    pub fn do_step(
        &mut self,
        current_time: f64,
        step_size: f64,
        no_set_fmu_state_prior_to_current_point: bool,
    ) -> Result<Fmi2Res, Error> {
        self.call("fmi2DoStep", |inst| {
            inst.do_step(
                current_time,
                step_size,
                no_set_fmu_state_prior_to_current_point,
            )
        })
    }

    /// Run the initialization sequence: setup-experiment, enter-init, `initial_values`,
    /// exit-init.
    ///
    /// With [`ErrorPolicy::BestEffort`] every call is made even after a failure, and the first
    /// failure is returned at the end; with [`ErrorPolicy::FailFast`] the sequence stops at the
    /// first failure.
    pub fn initialize(
        &mut self,
        tolerance: f64,
        initial_values: &[(fmi2ValueReference, f64)],
        policy: ErrorPolicy,
    ) -> Result<(), Error> {
        let mut sequence = Sequence::new(policy);
        sequence.run(|| self.setup_experiment(tolerance, 0.0))?;
        sequence.run(|| self.enter_initialization_mode())?;
        for (vr, value) in initial_values {
            sequence.run(|| self.set_real(*vr, *value))?;
        }
        sequence.run(|| self.exit_initialization_mode())?;
        sequence.finish()
    }

    /// Put the model back into initialization: reset, then the [`FmuBinding::initialize`]
    /// sequence.
    pub fn reset(
        &mut self,
        tolerance: f64,
        initial_values: &[(fmi2ValueReference, f64)],
        policy: ErrorPolicy,
    ) -> Result<(), Error> {
        let mut sequence = Sequence::new(policy);
        sequence.run(|| self.call("fmi2Reset", |inst| inst.reset()))?;
        sequence.run(|| self.initialize(tolerance, initial_values, policy))?;
        sequence.finish()
    }

    /// Terminate and free the model. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.instance.is_none() {
            return;
        }
        if let Err(err) = self.call("fmi2Terminate", |inst| inst.terminate()) {
            log::warn!("Freeing {} without clean termination: {err}", self.name);
        }
        // Dropping the instance frees the component, then the library and the extraction dir.
        self.instance = None;
        log::debug!("Destroyed FMU instance {}", self.name);
    }
}

impl Drop for FmuBinding {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Runs a sequence of calls under an [`ErrorPolicy`], remembering the first failure.
struct Sequence {
    policy: ErrorPolicy,
    first_error: Option<Error>,
}

impl Sequence {
    fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy,
            first_error: None,
        }
    }

    fn run<T>(&mut self, f: impl FnOnce() -> Result<T, Error>) -> Result<(), Error> {
        match (f(), self.policy) {
            (Ok(_), _) => Ok(()),
            (Err(err), ErrorPolicy::FailFast) => Err(err),
            (Err(err), ErrorPolicy::BestEffort) => {
                self.first_error.get_or_insert(err);
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<(), Error> {
        self.first_error.map_or(Ok(()), Err)
    }
}
