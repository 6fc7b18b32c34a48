use yaserde_derive::YaDeserialize;

/// Present in the model description if the FMU implements FMI for Model Exchange.
#[derive(Clone, Default, PartialEq, Debug, YaDeserialize)]
pub struct ModelExchange {
    /// Short class name according to C-syntax
    #[yaserde(attribute = true, rename = "modelIdentifier")]
    pub model_identifier: String,

    /// If true, a tool is needed to execute the model and the FMU just contains the communication
    /// to this tool.
    #[yaserde(attribute = true, rename = "needsExecutionTool")]
    pub needs_execution_tool: bool,
}

/// Present in the model description if the FMU implements FMI for Co-Simulation.
#[derive(Clone, Default, PartialEq, Debug, YaDeserialize)]
pub struct CoSimulation {
    /// Short class name according to C-syntax, also the base name of the shared library.
    #[yaserde(attribute = true, rename = "modelIdentifier")]
    pub model_identifier: String,

    #[yaserde(attribute = true, rename = "needsExecutionTool")]
    pub needs_execution_tool: bool,

    #[yaserde(attribute = true, rename = "canHandleVariableCommunicationStepSize")]
    pub can_handle_variable_communication_step_size: bool,

    #[yaserde(attribute = true, rename = "canBeInstantiatedOnlyOncePerProcess")]
    pub can_be_instantiated_only_once_per_process: bool,

    #[yaserde(attribute = true, rename = "canNotUseMemoryManagementFunctions")]
    pub can_not_use_memory_management_functions: bool,

    #[yaserde(attribute = true, rename = "canGetAndSetFMUstate")]
    pub can_get_and_set_fmu_state: bool,

    #[yaserde(attribute = true, rename = "canSerializeFMUstate")]
    pub can_serialize_fmu_state: bool,
}

/// The interface kinds an FMU provides.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FmuKind {
    ModelExchange,
    CoSimulation,
    /// Both interfaces are implemented by the same binary.
    ModelExchangeAndCoSimulation,
}

impl FmuKind {
    pub fn supports_co_simulation(self) -> bool {
        !matches!(self, FmuKind::ModelExchange)
    }
}
