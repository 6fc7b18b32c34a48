use yaserde_derive::YaDeserialize;

#[derive(Clone, Default, PartialEq, Debug, YaDeserialize)]
pub enum Causality {
    #[yaserde(rename = "parameter")]
    Parameter,
    #[yaserde(rename = "calculatedParameter")]
    CalculatedParameter,
    #[yaserde(rename = "input")]
    Input,
    #[yaserde(rename = "output")]
    Output,
    #[default]
    #[yaserde(rename = "local")]
    Local,
    #[yaserde(rename = "independent")]
    Independent,
}

/// Enumeration that defines the time dependency of the variable.
///
/// The default is [`Variability::Continuous`].
#[derive(Clone, Default, PartialEq, Debug, YaDeserialize)]
pub enum Variability {
    /// The value of the variable never changes.
    #[yaserde(rename = "constant")]
    Constant,
    /// The value of the variable is fixed after initialization.
    #[yaserde(rename = "fixed")]
    Fixed,
    /// The value only changes when a tunable parameter or input changes.
    #[yaserde(rename = "tunable")]
    Tunable,
    /// The value is only changed at communication points.
    #[yaserde(rename = "discrete")]
    Discrete,
    #[default]
    #[yaserde(rename = "continuous")]
    Continuous,
}

#[derive(Clone, Default, PartialEq, Debug, YaDeserialize)]
pub struct Real {
    /// If present, name of type defined with TypeDefinitions / SimpleType providing defaults.
    #[yaserde(attribute = true, rename = "declaredType")]
    pub declared_type: Option<String>,

    /// Value before initialization, if initial=exact or approx.
    #[yaserde(attribute = true)]
    pub start: Option<f64>,

    #[yaserde(attribute = true)]
    pub unit: Option<String>,
}

#[derive(Clone, Default, PartialEq, Debug, YaDeserialize)]
pub struct ScalarVariable {
    /// The full, unique name of the variable.
    #[yaserde(attribute = true)]
    pub name: String,

    /// A handle of the variable to efficiently identify the variable value in the model interface.
    #[yaserde(attribute = true, rename = "valueReference")]
    pub value_reference: u32,

    /// An optional description string describing the meaning of the variable.
    #[yaserde(attribute = true)]
    pub description: Option<String>,

    #[yaserde(attribute = true)]
    pub causality: Causality,

    #[yaserde(attribute = true)]
    pub variability: Variability,

    /// Set when the variable is of type Real; other base types leave this empty.
    #[yaserde(rename = "Real")]
    pub real: Option<Real>,
}

impl ScalarVariable {
    pub fn is_real(&self) -> bool {
        self.real.is_some()
    }

    pub fn start(&self) -> Option<f64> {
        self.real.as_ref().and_then(|real| real.start)
    }
}
