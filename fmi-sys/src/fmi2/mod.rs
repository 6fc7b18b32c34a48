//! FMI 2.0 types and the runtime-loaded [`Fmi2Binding`], generated by bindgen from the
//! vendored `fmi2Functions.h`.
#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::all)]

include!(concat!(env!("OUT_DIR"), "/fmi2_bindings.rs"));

pub mod logger;

impl std::fmt::Debug for Fmi2Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fmi2Binding")
            .field("library", &self.__library)
            .finish_non_exhaustive()
    }
}

impl Fmi2Binding {
    /// Co-Simulation entry points used by `fmu-cosim` that the library does not export.
    ///
    /// Calling an unresolved entry point panics, so callers check this right after loading.
    pub fn missing_symbols(&self) -> Vec<&'static str> {
        let resolved = [
            ("fmi2GetTypesPlatform", self.fmi2GetTypesPlatform.is_ok()),
            ("fmi2GetVersion", self.fmi2GetVersion.is_ok()),
            ("fmi2Instantiate", self.fmi2Instantiate.is_ok()),
            ("fmi2FreeInstance", self.fmi2FreeInstance.is_ok()),
            ("fmi2SetupExperiment", self.fmi2SetupExperiment.is_ok()),
            ("fmi2EnterInitializationMode", self.fmi2EnterInitializationMode.is_ok()),
            ("fmi2ExitInitializationMode", self.fmi2ExitInitializationMode.is_ok()),
            ("fmi2Terminate", self.fmi2Terminate.is_ok()),
            ("fmi2Reset", self.fmi2Reset.is_ok()),
            ("fmi2GetReal", self.fmi2GetReal.is_ok()),
            ("fmi2SetReal", self.fmi2SetReal.is_ok()),
            ("fmi2DoStep", self.fmi2DoStep.is_ok()),
        ];
        resolved
            .into_iter()
            .filter_map(|(name, ok)| (!ok).then_some(name))
            .collect()
    }
}

impl fmi2CallbackFunctions {
    /// Callbacks that route FMU log output into the `log` crate and let the FMU allocate with
    /// the C allocator supplied by the caller.
    pub fn with_allocator(
        allocate_memory: fmi2CallbackAllocateMemory,
        free_memory: fmi2CallbackFreeMemory,
    ) -> Self {
        Self {
            logger: Some(logger::callback_logger_handler as _),
            allocateMemory: allocate_memory,
            freeMemory: free_memory,
            stepFinished: None,
            componentEnvironment: std::ptr::null_mut(),
        }
    }
}
