//! FMI 2.0 Co-Simulation API

pub mod import;
pub mod instance;
// Re-export
pub use fmi_schema::fmi2 as schema;
pub use fmi_sys::fmi2 as binding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fmi2Res {
    /// All well
    OK,
    /// Things are not quite right, but the computation can continue. Function “logger” was called
    /// in the model, and it is expected that this function has shown the prepared information
    /// message to the user.
    Warning,
    /// This status is returned only from the co-simulation interface, if the slave executes the
    /// function in an asynchronous way. That means the slave starts to compute but returns
    /// immediately.
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Fmi2Error {
    /// For “co-simulation”: [`Fmi2Error::Discard`] is returned also if the slave is not able to
    /// return the required status information. The master has to decide if the simulation run
    /// can be continued.
    #[error("Discard")]
    Discard,
    /// The FMU encountered an error. The simulation cannot be continued with this FMU instance
    /// unless it is reset.
    #[error("Error")]
    Error,
    /// The model computations are irreparably corrupted for all FMU instances.
    #[error("Fatal")]
    Fatal,
}

#[derive(Debug)]
pub struct Fmi2Status(binding::fmi2Status);

impl Fmi2Status {
    /// Convert to [`Result<Fmi2Res, Fmi2Error>`]
    #[inline]
    pub fn ok(self) -> Result<Fmi2Res, Fmi2Error> {
        self.into()
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.0 == binding::fmi2Status_fmi2Error || self.0 == binding::fmi2Status_fmi2Fatal
    }
}

impl From<binding::fmi2Status> for Fmi2Status {
    fn from(status: binding::fmi2Status) -> Self {
        Self(status)
    }
}

impl From<Fmi2Status> for Result<Fmi2Res, Fmi2Error> {
    fn from(Fmi2Status(status): Fmi2Status) -> Self {
        match status {
            binding::fmi2Status_fmi2OK => Ok(Fmi2Res::OK),
            binding::fmi2Status_fmi2Warning => Ok(Fmi2Res::Warning),
            binding::fmi2Status_fmi2Pending => Ok(Fmi2Res::Pending),
            binding::fmi2Status_fmi2Discard => Err(Fmi2Error::Discard),
            binding::fmi2Status_fmi2Error => Err(Fmi2Error::Error),
            binding::fmi2Status_fmi2Fatal => Err(Fmi2Error::Fatal),
            other => {
                log::error!("FMU returned invalid fmi2Status {other}");
                Err(Fmi2Error::Fatal)
            }
        }
    }
}
