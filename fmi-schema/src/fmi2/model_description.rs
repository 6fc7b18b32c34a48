use std::str::FromStr;

use yaserde_derive::YaDeserialize;

use super::{CoSimulation, FmuKind, ModelExchange, ScalarVariable};

#[derive(Default, Debug, YaDeserialize)]
#[yaserde(rename = "fmiModelDescription")]
pub struct Fmi2ModelDescription {
    /// Version of FMI (for FMI 2.0.x revisions fmiVersion is defined as "2.0").
    #[yaserde(attribute = true, rename = "fmiVersion")]
    pub fmi_version: String,

    /// The name of the model as used in the modeling environment that generated the XML file.
    #[yaserde(attribute = true, rename = "modelName")]
    pub model_name: String,

    /// Fingerprint of xml-file content to verify that xml-file and C-functions are compatible to
    /// each other
    #[yaserde(attribute = true)]
    pub guid: String,

    #[yaserde(attribute = true)]
    pub description: Option<String>,

    /// Name of the tool that generated the XML file.
    #[yaserde(attribute = true, rename = "generationTool")]
    pub generation_tool: Option<String>,

    #[yaserde(attribute = true, rename = "numberOfEventIndicators")]
    pub number_of_event_indicators: u32,

    /// If present, the FMU is based on FMI for Model Exchange
    #[yaserde(rename = "ModelExchange")]
    pub model_exchange: Option<ModelExchange>,

    /// If present, the FMU is based on FMI for Co-Simulation
    #[yaserde(rename = "CoSimulation")]
    pub co_simulation: Option<CoSimulation>,

    #[yaserde(rename = "LogCategories")]
    pub log_categories: Option<LogCategories>,

    #[yaserde(rename = "DefaultExperiment")]
    pub default_experiment: Option<DefaultExperiment>,

    #[yaserde(rename = "ModelVariables")]
    pub model_variables: ModelVariables,
}

impl Fmi2ModelDescription {
    /// The model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Which interfaces the FMU declares, or `None` if it declares neither.
    pub fn kind(&self) -> Option<FmuKind> {
        match (&self.model_exchange, &self.co_simulation) {
            (Some(_), Some(_)) => Some(FmuKind::ModelExchangeAndCoSimulation),
            (Some(_), None) => Some(FmuKind::ModelExchange),
            (None, Some(_)) => Some(FmuKind::CoSimulation),
            (None, None) => None,
        }
    }

    /// Total number of variables
    pub fn num_variables(&self) -> usize {
        self.model_variables.variables.len()
    }

    /// Get a iterator of the ScalarVariables
    pub fn model_variables(&self) -> impl Iterator<Item = &ScalarVariable> {
        self.model_variables.variables.iter()
    }

    /// Case-sensitive lookup of a variable by its full name.
    pub fn model_variable_by_name(&self, name: &str) -> Result<&ScalarVariable, crate::Error> {
        self.model_variables
            .variables
            .iter()
            .find(|var| var.name == name)
            .ok_or_else(|| crate::Error::VariableNotFound(name.to_owned()))
    }

    /// Names of all log categories the FMU declares.
    pub fn log_category_names(&self) -> Vec<&str> {
        self.log_categories
            .iter()
            .flat_map(|cats| cats.categories.iter().map(|cat| cat.name.as_str()))
            .collect()
    }
}

impl FromStr for Fmi2ModelDescription {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::deserialize(s)
    }
}

#[derive(Clone, Default, PartialEq, Debug, YaDeserialize)]
pub struct LogCategories {
    #[yaserde(rename = "Category")]
    pub categories: Vec<Category>,
}

#[derive(Clone, Default, PartialEq, Debug, YaDeserialize)]
pub struct Category {
    #[yaserde(attribute = true)]
    pub name: String,

    #[yaserde(attribute = true)]
    pub description: Option<String>,
}

#[derive(Clone, Default, PartialEq, Debug, YaDeserialize)]
pub struct DefaultExperiment {
    #[yaserde(attribute = true, rename = "startTime")]
    pub start_time: Option<f64>,

    #[yaserde(attribute = true, rename = "stopTime")]
    pub stop_time: Option<f64>,

    #[yaserde(attribute = true)]
    pub tolerance: Option<f64>,

    #[yaserde(attribute = true, rename = "stepSize")]
    pub step_size: Option<f64>,
}

#[derive(Default, Debug, YaDeserialize)]
pub struct ModelVariables {
    #[yaserde(rename = "ScalarVariable")]
    pub variables: Vec<ScalarVariable>,
}
