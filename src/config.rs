//! YAML configuration of the co-simulation.
//!
//! ```yaml
//! marsFMU:
//!   pendulum:
//!     fmu_path: models/pendulum.fmu
//!     instanceName: pendulum
//!     step_size: 0.01
//!     relative_tolerance: 0.0001
//!     inputs: [u]
//!     outputs: [theta]
//!     observed: [omega]
//!     io_mapping:
//!       joint_torque: external_torque
//!     initial_values:
//!       theta: 0.1
//! scheduler:
//!   group: mars_fmu
//!   timeout_ms: 5000
//! ```

use std::{
    fmt,
    marker::PhantomData,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer,
};

use crate::Error;

fn default_step_size() -> f64 {
    0.001
}

fn default_relative_tolerance() -> f64 {
    0.001
}

fn default_group() -> String {
    "mars_fmu".to_owned()
}

fn default_poll_interval_ms() -> u64 {
    1
}

fn default_teardown_poll_ms() -> u64 {
    10
}

/// Deserialize a YAML mapping into a vector of entries, keeping file order.
fn ordered_map<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct OrderedVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a mapping")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, V>()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedVisitor(PhantomData))
}

/// How blocked callers wait for progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Sleep on a condition variable, woken as soon as progress is made.
    #[default]
    Condvar,
    /// Re-check the condition after every poll interval.
    Polling,
}

/// What to do when an FMI call, a variable lookup or a model load fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Log the failure and carry on with whatever still works.
    #[default]
    BestEffort,
    /// Abort the current sequence and surface the error.
    FailFast,
}

/// Settings shared by the master and all nodes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Root directory for per-model extraction directories. Defaults to `<cwd>/tmp`.
    #[serde(default)]
    pub tmp_dir: Option<PathBuf>,

    /// Data bus group all channels are published under.
    #[serde(default = "default_group")]
    pub group: String,

    /// Idle sleep of node and master threads, and the polling period of blocked callers.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Sleep between checks while waiting for a worker thread to exit.
    #[serde(default = "default_teardown_poll_ms")]
    pub teardown_poll_ms: u64,

    #[serde(default)]
    pub wait_strategy: WaitStrategy,

    /// Upper bound for blocking in `update()` and `reset()`. Unbounded if absent.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub error_policy: ErrorPolicy,

    /// Substituted for inputs that are unavailable or NaN.
    #[serde(default)]
    pub default_input: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tmp_dir: None,
            group: default_group(),
            poll_interval_ms: default_poll_interval_ms(),
            teardown_poll_ms: default_teardown_poll_ms(),
            wait_strategy: WaitStrategy::default(),
            timeout_ms: None,
            error_policy: ErrorPolicy::default(),
            default_input: 0.0,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn teardown_poll(&self) -> Duration {
        Duration::from_millis(self.teardown_poll_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// The directory models are extracted into.
    pub fn tmp_root(&self) -> Result<PathBuf, Error> {
        match &self.tmp_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?.join("tmp")),
        }
    }

    pub fn fail_fast(&self) -> bool {
        self.error_policy == ErrorPolicy::FailFast
    }
}

/// Declaration of one FMU.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelConfig {
    /// Path of the `.fmu` archive.
    #[serde(default)]
    pub fmu_path: PathBuf,

    /// Defaults to `Instance_N`, N being the 1-based position of the model in the file.
    #[serde(rename = "instanceName", default)]
    pub instance_name: String,

    /// Fixed communication step size in seconds.
    #[serde(default = "default_step_size")]
    pub step_size: f64,

    #[serde(default = "default_relative_tolerance")]
    pub relative_tolerance: f64,

    /// FMU inputs fed from the node's command channel.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// FMU outputs published on the bus.
    #[serde(default)]
    pub outputs: Vec<String>,

    /// FMU variables published on the bus for observation only.
    #[serde(default)]
    pub observed: Vec<String>,

    /// Pairs of a host signal and an FMU variable, in either order.
    #[serde(default, deserialize_with = "ordered_map")]
    pub io_mapping: Vec<(String, String)>,

    /// Values applied while the FMU is in initialization mode.
    #[serde(default, deserialize_with = "ordered_map")]
    pub initial_values: Vec<(String, f64)>,
}

impl ModelConfig {
    /// A model with default settings and no declared variables.
    pub fn new(instance_name: impl Into<String>, fmu_path: impl Into<PathBuf>) -> Self {
        Self {
            fmu_path: fmu_path.into(),
            instance_name: instance_name.into(),
            step_size: default_step_size(),
            relative_tolerance: default_relative_tolerance(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            observed: Vec::new(),
            io_mapping: Vec::new(),
            initial_values: Vec::new(),
        }
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    /// Check the settings a node cannot run without.
    pub fn validate(&self) -> Result<(), Error> {
        if self.fmu_path.as_os_str().is_empty() {
            return Err(Error::Config(format!(
                "{}: fmu_path is required",
                self.instance_name
            )));
        }
        if !(self.step_size > 0.0 && self.step_size.is_finite()) {
            return Err(Error::Config(format!(
                "{}: step_size must be positive, got {}",
                self.instance_name, self.step_size
            )));
        }
        if !(self.relative_tolerance > 0.0 && self.relative_tolerance.is_finite()) {
            return Err(Error::Config(format!(
                "{}: relative_tolerance must be positive, got {}",
                self.instance_name, self.relative_tolerance
            )));
        }
        Ok(())
    }
}

/// The whole co-simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CosimConfig {
    /// Models in file order.
    #[serde(rename = "marsFMU", default, deserialize_with = "ordered_map")]
    models: Vec<(String, ModelConfig)>,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl CosimConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|err| {
            Error::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let mut config: CosimConfig = serde_yaml::from_str(yaml)?;
        for (index, (_, model)) in config.models.iter_mut().enumerate() {
            if model.instance_name.is_empty() {
                model.instance_name = format!("Instance_{}", index + 1);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration programmatically; models are keyed by their instance name.
    pub fn new(models: Vec<ModelConfig>, scheduler: SchedulerConfig) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|model| (model.instance_name.clone(), model))
                .collect(),
            scheduler,
        }
    }

    /// Check the scheduler settings.
    ///
    /// Models are checked one by one as they are loaded, so that a bad declaration only costs
    /// that model under [`ErrorPolicy::BestEffort`].
    pub fn validate(&self) -> Result<(), Error> {
        if self.scheduler.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".to_owned()));
        }
        Ok(())
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelConfig> {
        self.models.iter().map(|(_, model)| model)
    }

    /// The key a model was declared under in the `marsFMU` mapping.
    pub fn model_keys(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|(key, _)| key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
marsFMU:
  pendulum:
    fmu_path: models/pendulum.fmu
    instanceName: pend
    step_size: 0.02
    inputs: [u]
    observed: [omega, theta]
    io_mapping:
      joint_torque: external_torque
      tau: wheel_motor
    initial_values:
      theta: 0.1
      omega: -0.5
  spring:
    fmu_path: models/spring.fmu
scheduler:
  group: sim
  wait_strategy: polling
  timeout_ms: 250
  error_policy: fail_fast
  default_input: 1.5
"#;

    #[test]
    fn test_from_yaml() {
        let config = CosimConfig::from_yaml(YAML).unwrap();
        assert_eq!(
            config.model_keys().collect::<Vec<_>>(),
            vec!["pendulum", "spring"]
        );

        let models: Vec<_> = config.models().collect();
        let pendulum = models[0];
        assert_eq!(pendulum.fmu_path, PathBuf::from("models/pendulum.fmu"));
        assert_eq!(pendulum.instance_name, "pend");
        assert_eq!(pendulum.step_size, 0.02);
        assert_eq!(pendulum.relative_tolerance, 0.001);
        assert_eq!(pendulum.inputs, vec!["u"]);
        assert!(pendulum.outputs.is_empty());
        assert_eq!(pendulum.observed, vec!["omega", "theta"]);
        assert_eq!(
            pendulum.io_mapping,
            vec![
                ("joint_torque".to_owned(), "external_torque".to_owned()),
                ("tau".to_owned(), "wheel_motor".to_owned()),
            ]
        );
        assert_eq!(
            pendulum.initial_values,
            vec![("theta".to_owned(), 0.1), ("omega".to_owned(), -0.5)]
        );

        let spring = models[1];
        assert_eq!(spring.instance_name, "Instance_2");
        assert_eq!(spring.step_size, 0.001);

        let scheduler = &config.scheduler;
        assert_eq!(scheduler.group, "sim");
        assert_eq!(scheduler.wait_strategy, WaitStrategy::Polling);
        assert_eq!(scheduler.timeout(), Some(Duration::from_millis(250)));
        assert!(scheduler.fail_fast());
        assert_eq!(scheduler.default_input, 1.5);
        assert_eq!(scheduler.poll_interval(), Duration::from_millis(1));
        assert_eq!(scheduler.teardown_poll(), Duration::from_millis(10));
    }

    #[test]
    fn test_defaults() {
        let config = CosimConfig::from_yaml("marsFMU: {}").unwrap();
        assert_eq!(config.models().count(), 0);
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.scheduler.timeout(), None);
        assert_eq!(
            config.scheduler.tmp_root().unwrap(),
            std::env::current_dir().unwrap().join("tmp")
        );
    }

    #[test]
    fn test_invalid_model_is_kept() {
        let yaml = "marsFMU:\n  good:\n    fmu_path: good.fmu\n  bad:\n    step_size: 0.02\n";
        let config = CosimConfig::from_yaml(yaml).unwrap();
        let models: Vec<_> = config.models().collect();
        assert_eq!(models.len(), 2);
        assert!(models[0].validate().is_ok());

        let err = models[1].validate().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
        assert_eq!(
            err.to_string(),
            "Invalid configuration: Instance_2: fmu_path is required"
        );

        let zero_step = ModelConfig::new("a", "a.fmu").with_step_size(0.0);
        let err = zero_step.validate().unwrap_err();
        assert!(err.to_string().contains("step_size"));
    }

    #[test]
    fn test_invalid_scheduler() {
        let err = CosimConfig::from_yaml("scheduler:\n  poll_interval_ms: 0\n").unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));

        let err = CosimConfig::from_yaml("scheduler:\n  wait_strategy: spin\n").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = CosimConfig::load("/nonexistent/fmu.yml").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }
}
