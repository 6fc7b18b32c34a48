//! The `fmu-cosim` crate runs FMI 2.0 Co-Simulation FMUs in lockstep with a host simulation.
//!
//! An [`FmuMaster`] owns one [`FmuNode`] per configured model. Each node steps its FMU on a
//! dedicated thread at the model's own step size; the master harmonises all step sizes into a
//! single macro step, publishes a shared timer and blocks the host's [`FmuMaster::update`] until
//! every node has caught up with host time.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fmu_cosim::{CosimConfig, FmuMaster, MemoryBus, SignalTable};
//!
//! let config = CosimConfig::load("fmu.yml").unwrap();
//! let host = Arc::new(SignalTable::default());
//! let bus = Arc::new(MemoryBus::default());
//!
//! let master = FmuMaster::new(&config, host, bus).unwrap();
//! for _ in 0..100 {
//!     // Host simulation advanced by 10 ms: wait for the FMUs to catch up.
//!     master.update(10.0).unwrap();
//! }
//! ```
#![deny(clippy::all)]

// Re-export the fmi-schema crate
pub use fmi_schema as schema;

pub mod binding;
pub mod bus;
pub mod clock;
pub mod config;
pub mod fmi2;
pub mod host;
pub mod master;
pub mod node;
pub mod resolver;
pub mod step_size;
pub mod traits;

pub use binding::FmuBinding;
pub use bus::{DataBus, DataPackage, MemoryBus};
pub use config::{CosimConfig, ErrorPolicy, ModelConfig, SchedulerConfig, WaitStrategy};
pub use host::{HostSignals, SignalId, SignalTable};
pub use master::FmuMaster;
pub use node::{FmuNode, NodeContext, NodeCore, NodeHealth, NodeStatus};
pub use resolver::{Direction, HostSignal, VariableBinding};
pub use traits::CoSimulation;

pub mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Coarse classification of [`Error`], used to pick a continuation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing paths, unsupported FMI version or kind, invalid settings.
    Configuration,
    /// A declared variable could not be found in the model or in the host.
    Resolution,
    /// A native FMI call returned a non-OK status.
    Abi,
    /// A worker thread could not be created or died.
    Threading,
    /// A bounded wait expired.
    Timeout,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error instantiating FMU {0}")]
    Instantiation(String),

    #[error("Unknown variable: {}", name)]
    UnknownVariable { name: String },

    #[error("Neither {first} nor {second} is a known motor or sensor")]
    UnresolvedMapping { first: String, second: String },

    #[error("Model type {0} not supported by this FMU")]
    UnsupportedFmuType(String),

    #[error("Unsupported platform {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Unsupported FMI version: {0}")]
    UnsupportedFmiVersion(String),

    #[error("FMI version of loaded API ({found}) doesn't match expected ({expected})")]
    FmiVersionMismatch { found: String, expected: String },

    #[error("TypesPlatform of loaded API ({0}) doesn't match expected (default)")]
    TypesPlatformMismatch(String),

    #[error("FMU archive structure is not as expected: {0}")]
    ArchiveStructure(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{operation} failed for {instance}: {source}")]
    Abi {
        instance: String,
        operation: &'static str,
        #[source]
        source: fmi2::Fmi2Error,
    },

    #[error("FMU instance {0} has already been freed")]
    Freed(String),

    #[error("Failed to spawn thread {name}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker thread {0} panicked")]
    ThreadPanicked(String),

    #[error("Timed out after {0:?} waiting for the co-simulation to catch up")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Schema(#[from] fmi_schema::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Nul(#[from] std::ffi::NulError),

    #[error(transparent)]
    LibLoading {
        #[from]
        source: libloading::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownVariable { .. } | Error::UnresolvedMapping { .. } => {
                ErrorKind::Resolution
            }
            Error::Instantiation(_) | Error::Abi { .. } | Error::Freed(_) => ErrorKind::Abi,
            Error::Spawn { .. } | Error::ThreadPanicked(_) => ErrorKind::Threading,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::UnsupportedFmuType(_)
            | Error::UnsupportedPlatform { .. }
            | Error::UnsupportedFmiVersion(_)
            | Error::FmiVersionMismatch { .. }
            | Error::TypesPlatformMismatch(_)
            | Error::ArchiveStructure(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Zip(_)
            | Error::Schema(_)
            | Error::Yaml(_)
            | Error::Nul(_)
            | Error::LibLoading { .. } => ErrorKind::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::UnsupportedFmuType("CoSimulation".to_owned()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::UnknownVariable {
                name: "x".to_owned()
            }
            .kind(),
            ErrorKind::Resolution
        );
        assert_eq!(
            Error::Abi {
                instance: "a".to_owned(),
                operation: "fmi2DoStep",
                source: fmi2::Fmi2Error::Discard,
            }
            .kind(),
            ErrorKind::Abi
        );
        assert_eq!(
            Error::Timeout(std::time::Duration::from_millis(5)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            Error::ThreadPanicked("fmu-a".to_owned()).kind(),
            ErrorKind::Threading
        );
    }

    #[test]
    fn test_abi_message() {
        let err = Error::Abi {
            instance: "pendulum".to_owned(),
            operation: "fmi2DoStep",
            source: fmi2::Fmi2Error::Error,
        };
        assert_eq!(err.to_string(), "fmi2DoStep failed for pendulum: Error");
    }
}
