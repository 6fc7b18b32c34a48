//! A pure-Rust Co-Simulation model and helpers shared by the integration tests.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    io::Write,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use fmu_cosim::{
    fmi2::{
        binding::{fmi2Real, fmi2ValueReference},
        Fmi2Error, Fmi2Res,
    },
    CoSimulation, FmuBinding, ModelConfig, SchedulerConfig,
};

/// Input, integrated into `Y`.
pub const U: fmi2ValueReference = 0;
/// Output, `y += k * u * h` on every step.
pub const Y: fmi2ValueReference = 1;
/// Model time after the last step.
pub const T: fmi2ValueReference = 2;
/// Gain parameter.
pub const K: fmi2ValueReference = 3;

const START_VALUES: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

/// Everything a test may want to inspect or tweak about a [`FakeModel`].
#[derive(Debug)]
pub struct FakeState {
    pub calls: Vec<&'static str>,
    pub values: [f64; 4],
    pub set_history: Vec<(fmi2ValueReference, f64)>,
    pub steps: Vec<(f64, f64)>,
    pub terminated: bool,
    pub freed: bool,
    /// Fail the step with this 0-based index.
    pub fail_step_at: Option<usize>,
    pub fail_enter_init: bool,
    pub step_delay: Duration,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            values: START_VALUES,
            set_history: Vec::new(),
            steps: Vec::new(),
            terminated: false,
            freed: false,
            fail_step_at: None,
            fail_enter_init: false,
            step_delay: Duration::ZERO,
        }
    }
}

pub type SharedState = Arc<Mutex<FakeState>>;

pub fn state(shared: &SharedState) -> MutexGuard<'_, FakeState> {
    shared.lock().unwrap()
}

pub struct FakeModel {
    state: SharedState,
}

impl Drop for FakeModel {
    fn drop(&mut self) {
        state(&self.state).freed = true;
    }
}

impl FakeModel {
    fn record(&self, call: &'static str) -> MutexGuard<'_, FakeState> {
        let mut state = state(&self.state);
        state.calls.push(call);
        state
    }
}

impl CoSimulation for FakeModel {
    fn get_version(&self) -> &str {
        "2.0"
    }

    fn get_types_platform(&self) -> &str {
        "default"
    }

    fn setup_experiment(
        &mut self,
        _tolerance: Option<f64>,
        _start_time: f64,
        _stop_time: Option<f64>,
    ) -> Result<Fmi2Res, Fmi2Error> {
        self.record("setup_experiment");
        Ok(Fmi2Res::OK)
    }

    fn enter_initialization_mode(&mut self) -> Result<Fmi2Res, Fmi2Error> {
        let state = self.record("enter_initialization_mode");
        if state.fail_enter_init {
            Err(Fmi2Error::Error)
        } else {
            Ok(Fmi2Res::OK)
        }
    }

    fn exit_initialization_mode(&mut self) -> Result<Fmi2Res, Fmi2Error> {
        self.record("exit_initialization_mode");
        Ok(Fmi2Res::OK)
    }

    fn terminate(&mut self) -> Result<Fmi2Res, Fmi2Error> {
        self.record("terminate").terminated = true;
        Ok(Fmi2Res::OK)
    }

    fn reset(&mut self) -> Result<Fmi2Res, Fmi2Error> {
        let mut state = self.record("reset");
        state.values = START_VALUES;
        Ok(Fmi2Res::OK)
    }

    fn get_real(
        &mut self,
        vrs: &[fmi2ValueReference],
        values: &mut [fmi2Real],
    ) -> Result<Fmi2Res, Fmi2Error> {
        let state = state(&self.state);
        for (vr, value) in vrs.iter().zip(values.iter_mut()) {
            *value = *state.values.get(*vr as usize).ok_or(Fmi2Error::Error)?;
        }
        Ok(Fmi2Res::OK)
    }

    fn set_real(
        &mut self,
        vrs: &[fmi2ValueReference],
        values: &[fmi2Real],
    ) -> Result<Fmi2Res, Fmi2Error> {
        let mut state = state(&self.state);
        for (vr, value) in vrs.iter().zip(values) {
            *state.values.get_mut(*vr as usize).ok_or(Fmi2Error::Error)? = *value;
            state.set_history.push((*vr, *value));
        }
        Ok(Fmi2Res::OK)
    }

    fn do_step(
        &mut self,
        current_communication_point: f64,
        communication_step_size: f64,
        _no_set_fmu_state_prior_to_current_point: bool,
    ) -> Result<Fmi2Res, Fmi2Error> {
        let delay = state(&self.state).step_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut state = self.record("do_step");
        let index = state.steps.len();
        state
            .steps
            .push((current_communication_point, communication_step_size));
        if state.fail_step_at == Some(index) {
            return Err(Fmi2Error::Discard);
        }
        let [u, y, _, k] = state.values;
        state.values[Y as usize] = y + k * u * communication_step_size;
        state.values[T as usize] = current_communication_point + communication_step_size;
        Ok(Fmi2Res::OK)
    }
}

pub fn variables() -> HashMap<String, fmi2ValueReference> {
    [("u", U), ("y", Y), ("t", T), ("k", K)]
        .into_iter()
        .map(|(name, vr)| (name.to_owned(), vr))
        .collect()
}

/// A binding around a fresh [`FakeModel`].
pub fn fake(name: &str) -> (FmuBinding, SharedState) {
    fake_with(name, |_| {})
}

pub fn fake_with(name: &str, setup: impl FnOnce(&mut FakeState)) -> (FmuBinding, SharedState) {
    let shared = SharedState::default();
    setup(&mut state(&shared));
    let model = FakeModel {
        state: shared.clone(),
    };
    let binding = FmuBinding::from_instance(name, variables(), Box::new(model));
    (binding, shared)
}

/// A model with input `u`, output `y` and observed `t`.
pub fn model(name: &str, step_size: f64) -> ModelConfig {
    let mut model = ModelConfig::new(name, format!("{name}.fmu")).with_step_size(step_size);
    model.inputs = vec!["u".to_owned()];
    model.outputs = vec!["y".to_owned()];
    model.observed = vec!["t".to_owned()];
    model
}

/// Scheduler settings that cannot hang a test forever.
pub fn scheduler() -> SchedulerConfig {
    SchedulerConfig {
        timeout_ms: Some(5_000),
        teardown_poll_ms: 1,
        ..Default::default()
    }
}

/// Write a zip archive with the given `(path, contents)` entries.
pub fn write_fmu(path: &Path, entries: &[(&str, &str)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, contents) in entries {
        zip.start_file(*name, zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// A minimal `modelDescription.xml` with the given FMI version and interface elements.
pub fn model_description(fmi_version: &str, interfaces: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<fmiModelDescription fmiVersion="{fmi_version}" modelName="Fake" guid="{{8c4e810f-3df3-4a00-8276-176fa3c9f000}}" numberOfEventIndicators="0">
  {interfaces}
  <ModelVariables>
    <ScalarVariable name="u" valueReference="0" causality="input" variability="continuous">
      <Real start="0"/>
    </ScalarVariable>
    <ScalarVariable name="y" valueReference="1" causality="output" variability="continuous">
      <Real/>
    </ScalarVariable>
  </ModelVariables>
  <ModelStructure/>
</fmiModelDescription>
"#
    )
}

pub const CO_SIMULATION: &str = r#"<CoSimulation modelIdentifier="fake" canHandleVariableCommunicationStepSize="true"/>"#;
pub const MODEL_EXCHANGE: &str = r#"<ModelExchange modelIdentifier="fake"/>"#;
