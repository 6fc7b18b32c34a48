//! The seam between the scheduler and an FMU implementation.

use crate::fmi2::{binding, Fmi2Error, Fmi2Res};

/// The subset of the FMI 2.0 Co-Simulation interface the scheduler drives.
///
/// Implemented by [`crate::fmi2::instance::Instance`] for native FMUs; any other implementation
/// (a pure-Rust model, a test double) can be wrapped in a [`crate::FmuBinding`] the same way.
pub trait CoSimulation {
    /// The FMI-standard version string
    fn get_version(&self) -> &str;

    fn get_types_platform(&self) -> &str;

    /// Informs the FMU to setup the experiment. Must be called after instantiation (or reset)
    /// and before `enter_initialization_mode()`.
    ///
    /// If `tolerance` is `Some(..)`, the slave may use it for the error estimation of its
    /// internal integrator. An FMU for Co-Simulation might ignore this argument.
    fn setup_experiment(
        &mut self,
        tolerance: Option<f64>,
        start_time: f64,
        stop_time: Option<f64>,
    ) -> Result<Fmi2Res, Fmi2Error>;

    /// Informs the FMU to enter Initialization Mode.
    ///
    /// Variables with `initial = "exact"` or `"approx"` may be set before this call; initial
    /// values that depend on parameters are set between this call and
    /// `exit_initialization_mode()`.
    fn enter_initialization_mode(&mut self) -> Result<Fmi2Res, Fmi2Error>;

    fn exit_initialization_mode(&mut self) -> Result<Fmi2Res, Fmi2Error>;

    /// Informs the FMU that the simulation run is terminated.
    fn terminate(&mut self) -> Result<Fmi2Res, Fmi2Error>;

    /// Puts the FMU back into the state it had right after instantiation.
    fn reset(&mut self) -> Result<Fmi2Res, Fmi2Error>;

    fn get_real(
        &mut self,
        vrs: &[binding::fmi2ValueReference],
        values: &mut [binding::fmi2Real],
    ) -> Result<Fmi2Res, Fmi2Error>;

    fn set_real(
        &mut self,
        vrs: &[binding::fmi2ValueReference],
        values: &[binding::fmi2Real],
    ) -> Result<Fmi2Res, Fmi2Error>;

    /// The computation of a time step is started.
    ///
    /// `no_set_fmu_state_prior_to_current_point` is `true` if the master will not roll back to
    /// a point before `current_communication_point`.
    fn do_step(
        &mut self,
        current_communication_point: f64,
        communication_step_size: f64,
        no_set_fmu_state_prior_to_current_point: bool,
    ) -> Result<Fmi2Res, Fmi2Error>;
}
