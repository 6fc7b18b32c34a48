//! Native FMI 2.0 Co-Simulation instance

use std::ffi::{CStr, CString};

use super::{binding, import::Fmi2Import, schema, Fmi2Error, Fmi2Res, Fmi2Status};
use crate::{traits::CoSimulation, Error};

/// One instantiated Co-Simulation component of a native FMU.
///
/// The instance owns the extracted archive and the loaded library. On drop the component is
/// freed first, then the library is unloaded and finally the extraction directory is removed.
pub struct Instance {
    /// Copy of the instance name
    name: String,
    /// Pointer to the raw FMI 2.0 instance
    component: binding::fmi2Component,
    /// Callbacks struct, must outlive the component
    #[allow(dead_code)]
    callbacks: Box<binding::fmi2CallbackFunctions>,
    /// Raw FMI 2.0 bindings
    binding: binding::Fmi2Binding,
    /// Extracted archive and model description
    import: Fmi2Import,
}

// The component is only ever used through `&mut self` or from `Drop`, so moving an `Instance`
// to the worker thread that exclusively steps it is sound.
unsafe impl Send for Instance {}

impl Drop for Instance {
    fn drop(&mut self) {
        log::trace!("Freeing component {:?} of {}", self.component, self.name);
        unsafe { self.binding.fmi2FreeInstance(self.component) };
    }
}

impl Instance {
    /// Load the shared library of `import` and instantiate a Co-Simulation component.
    pub fn new(
        import: Fmi2Import,
        instance_name: &str,
        visible: bool,
        logging_on: bool,
    ) -> Result<Self, Error> {
        let binding = import.binding(import.model_identifier()?)?;

        let callbacks = Box::new(binding::fmi2CallbackFunctions::with_allocator(
            Some(libc::calloc),
            Some(libc::free),
        ));

        let name = instance_name.to_owned();
        let instance_name = CString::new(instance_name)?;
        let guid = CString::new(import.model_description().guid.as_bytes())?;
        let resource_url = CString::new(import.canonical_resource_path_string()?)?;

        let component = unsafe {
            let callback_functions = &*callbacks as *const binding::fmi2CallbackFunctions;
            binding.fmi2Instantiate(
                instance_name.as_ptr(),
                binding::fmi2Type_fmi2CoSimulation,
                guid.as_ptr(),                      // guid
                resource_url.as_ptr(),              // fmu_resource_location
                callback_functions,                 // functions
                visible as binding::fmi2Boolean,    // visible
                logging_on as binding::fmi2Boolean, // logging_on
            )
        };
        if component.is_null() {
            return Err(Error::Instantiation(name));
        }
        log::trace!("Created FMI2.0 CS component {component:?}");

        Ok(Self {
            name,
            component,
            callbacks,
            binding,
            import,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model_description(&self) -> &schema::Fmi2ModelDescription {
        self.import.model_description()
    }

    /// Check the internal consistency of the FMU by comparing the TypesPlatform and FMI versions
    /// from the library and the Model Description XML
    pub fn check_consistency(&self) -> Result<(), Error> {
        let types_platform = self.get_types_platform();
        if types_platform != "default" {
            return Err(Error::TypesPlatformMismatch(types_platform.to_owned()));
        }

        let fmi_version = self.get_version();
        if fmi_version != self.model_description().fmi_version {
            return Err(Error::FmiVersionMismatch {
                found: fmi_version.to_owned(),
                expected: self.model_description().fmi_version.to_owned(),
            });
        }

        Ok(())
    }
}

impl CoSimulation for Instance {
    fn get_version(&self) -> &str {
        unsafe { CStr::from_ptr(self.binding.fmi2GetVersion()) }
            .to_str()
            .unwrap_or_default()
    }

    fn get_types_platform(&self) -> &str {
        unsafe { CStr::from_ptr(self.binding.fmi2GetTypesPlatform()) }
            .to_str()
            .unwrap_or_default()
    }

    fn setup_experiment(
        &mut self,
        tolerance: Option<f64>,
        start_time: f64,
        stop_time: Option<f64>,
    ) -> Result<Fmi2Res, Fmi2Error> {
        Fmi2Status::from(unsafe {
            self.binding.fmi2SetupExperiment(
                self.component,
                tolerance.is_some() as binding::fmi2Boolean,
                tolerance.unwrap_or(0.0),
                start_time,
                stop_time.is_some() as binding::fmi2Boolean,
                stop_time.unwrap_or(0.0),
            )
        })
        .ok()
    }

    fn enter_initialization_mode(&mut self) -> Result<Fmi2Res, Fmi2Error> {
        Fmi2Status::from(unsafe { self.binding.fmi2EnterInitializationMode(self.component) }).ok()
    }

    fn exit_initialization_mode(&mut self) -> Result<Fmi2Res, Fmi2Error> {
        Fmi2Status::from(unsafe { self.binding.fmi2ExitInitializationMode(self.component) }).ok()
    }

    fn terminate(&mut self) -> Result<Fmi2Res, Fmi2Error> {
        Fmi2Status::from(unsafe { self.binding.fmi2Terminate(self.component) }).ok()
    }

    fn reset(&mut self) -> Result<Fmi2Res, Fmi2Error> {
        Fmi2Status::from(unsafe { self.binding.fmi2Reset(self.component) }).ok()
    }

    fn get_real(
        &mut self,
        vrs: &[binding::fmi2ValueReference],
        values: &mut [binding::fmi2Real],
    ) -> Result<Fmi2Res, Fmi2Error> {
        if vrs.len() != values.len() {
            return Err(Fmi2Error::Error);
        }
        Fmi2Status::from(unsafe {
            self.binding
                .fmi2GetReal(self.component, vrs.as_ptr(), vrs.len(), values.as_mut_ptr())
        })
        .ok()
    }

    fn set_real(
        &mut self,
        vrs: &[binding::fmi2ValueReference],
        values: &[binding::fmi2Real],
    ) -> Result<Fmi2Res, Fmi2Error> {
        if vrs.len() != values.len() {
            return Err(Fmi2Error::Error);
        }
        Fmi2Status::from(unsafe {
            self.binding
                .fmi2SetReal(self.component, vrs.as_ptr(), values.len(), values.as_ptr())
        })
        .ok()
    }

    fn do_step(
        &mut self,
        current_communication_point: f64,
        communication_step_size: f64,
        no_set_fmu_state_prior_to_current_point: bool,
    ) -> Result<Fmi2Res, Fmi2Error> {
        Fmi2Status::from(unsafe {
            self.binding.fmi2DoStep(
                self.component,
                current_communication_point,
                communication_step_size,
                no_set_fmu_state_prior_to_current_point as binding::fmi2Boolean,
            )
        })
        .ok()
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Instance {} {{Import {}, {:?}}}",
            self.name,
            self.model_description().model_name,
            self.component,
        )
    }
}
