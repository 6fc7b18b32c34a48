//! Turning declared variable names into bindings between the host, the FMU and the data bus.
//!
//! Resolution is a pure function over three lookup tables (motor name → id, sensor name → id,
//! FMU variable name → value reference), so its behaviour can be checked without an FMU or a
//! host simulation.

use std::collections::HashMap;

use crate::{config::ModelConfig, fmi2::binding::fmi2ValueReference, host::SignalId, Error};

/// Data flow of a bound FMU variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Host → FMU
    Input,
    /// FMU → host
    Output,
    /// FMU → bus only
    Observed,
}

impl Direction {
    /// Key prefix of this direction in a data package.
    pub fn prefix(self) -> &'static str {
        match self {
            Direction::Input => "inputs",
            Direction::Output => "outputs",
            Direction::Observed => "observed",
        }
    }
}

/// Host signal an FMU variable is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostSignal {
    /// A motor the FMU output drives.
    Motor(SignalId),
    /// A sensor the FMU input reads.
    Sensor(SignalId),
}

/// Resolved mapping of one declared FMU variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableBinding {
    /// FMU variable name
    pub name: String,
    /// FMU value reference
    pub vr: fmi2ValueReference,
    /// Wired host signal, if any. Without one, inputs come from the command channel.
    pub host: Option<HostSignal>,
    pub direction: Direction,
}

impl VariableBinding {
    /// Key of this variable in a data package, e.g. `outputs/theta`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.direction.prefix(), self.name)
    }
}

/// Which side of the host a name lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSide {
    /// A motor: the host consumes the value, so the paired FMU variable is an output.
    HostInput(SignalId),
    /// A sensor: the host produces the value, so the paired FMU variable is an input.
    HostOutput(SignalId),
    Unresolved,
}

/// The three namespaces resolution looks names up in.
pub struct Namespaces<'a> {
    pub motors: &'a dyn Fn(&str) -> Option<SignalId>,
    pub sensors: &'a dyn Fn(&str) -> Option<SignalId>,
    pub fmu: &'a dyn Fn(&str) -> Option<fmi2ValueReference>,
}

impl Namespaces<'_> {
    /// Try `name` as a motor first, then as a sensor.
    pub fn classify_host_side(&self, name: &str) -> HostSide {
        if let Some(id) = (self.motors)(name) {
            HostSide::HostInput(id)
        } else if let Some(id) = (self.sensors)(name) {
            HostSide::HostOutput(id)
        } else {
            HostSide::Unresolved
        }
    }

    pub fn resolve(&self, name: &str) -> Result<fmi2ValueReference, Error> {
        (self.fmu)(name).ok_or_else(|| Error::UnknownVariable {
            name: name.to_owned(),
        })
    }

    /// Bind a variable declared in one of the `inputs` / `outputs` / `observed` lists.
    pub fn resolve_declared(
        &self,
        name: &str,
        direction: Direction,
    ) -> Result<VariableBinding, Error> {
        Ok(VariableBinding {
            name: name.to_owned(),
            vr: self.resolve(name)?,
            host: None,
            direction,
        })
    }

    /// Bind an `io_mapping` pair.
    ///
    /// `first` is tried as a host signal; if it is neither a motor nor a sensor, `second` is
    /// tried instead and `first` becomes the FMU side. The pair is skipped entirely when no host
    /// side is found or the FMU side does not exist.
    pub fn resolve_pair(&self, first: &str, second: &str) -> Result<VariableBinding, Error> {
        let (side, fmu_name) = match self.classify_host_side(first) {
            HostSide::Unresolved => (self.classify_host_side(second), first),
            side => (side, second),
        };
        let (host, direction) = match side {
            HostSide::HostInput(id) => (HostSignal::Motor(id), Direction::Output),
            HostSide::HostOutput(id) => (HostSignal::Sensor(id), Direction::Input),
            HostSide::Unresolved => {
                return Err(Error::UnresolvedMapping {
                    first: first.to_owned(),
                    second: second.to_owned(),
                })
            }
        };
        Ok(VariableBinding {
            name: fmu_name.to_owned(),
            vr: self.resolve(fmu_name)?,
            host: Some(host),
            direction,
        })
    }

    /// Resolve every declaration of `model`: the `io_mapping` pairs in file order, then the
    /// `inputs`, `outputs` and `observed` lists.
    ///
    /// Failures are collected rather than returned so that the caller can apply its error
    /// policy; duplicates are bound independently.
    pub fn resolve_model(&self, model: &ModelConfig) -> Resolution {
        let mut resolution = Resolution::default();
        for (first, second) in &model.io_mapping {
            resolution.push(self.resolve_pair(first, second));
        }
        let declared = [
            (&model.inputs, Direction::Input),
            (&model.outputs, Direction::Output),
            (&model.observed, Direction::Observed),
        ];
        for (names, direction) in declared {
            for name in names {
                resolution.push(self.resolve_declared(name, direction));
            }
        }
        resolution
    }
}

/// Outcome of [`Namespaces::resolve_model`].
#[derive(Debug, Default)]
pub struct Resolution {
    pub bindings: Vec<VariableBinding>,
    pub failures: Vec<Error>,
}

impl Resolution {
    fn push(&mut self, result: Result<VariableBinding, Error>) {
        match result {
            Ok(binding) => {
                log::debug!(
                    "FMU {:?} : {} ({:?})",
                    binding.direction,
                    binding.name,
                    binding.host
                );
                self.bindings.push(binding);
            }
            Err(err) => self.failures.push(err),
        }
    }

    /// Bindings keyed by value reference; later bindings of the same reference win.
    pub fn by_reference(&self) -> HashMap<fmi2ValueReference, &VariableBinding> {
        self.bindings
            .iter()
            .map(|binding| (binding.vr, binding))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tables {
        motors: HashMap<String, SignalId>,
        sensors: HashMap<String, SignalId>,
        fmu: HashMap<String, fmi2ValueReference>,
    }

    impl Tables {
        fn new() -> Self {
            let table = |entries: &[(&str, u64)]| {
                entries
                    .iter()
                    .map(|(name, id)| (name.to_string(), *id))
                    .collect::<HashMap<_, _>>()
            };
            Self {
                motors: table(&[("wheel_motor", 1), ("shared", 2)]),
                sensors: table(&[("joint_torque", 10), ("shared", 11)]),
                fmu: table(&[("external_torque", 0), ("tau", 1), ("theta", 2), ("omega", 3)])
                    .into_iter()
                    .map(|(name, vr)| (name, vr as fmi2ValueReference))
                    .collect(),
            }
        }

        fn check<R>(&self, f: impl FnOnce(&Namespaces) -> R) -> R {
            let motors = |name: &str| self.motors.get(name).copied();
            let sensors = |name: &str| self.sensors.get(name).copied();
            let fmu = |name: &str| self.fmu.get(name).copied();
            f(&Namespaces {
                motors: &motors,
                sensors: &sensors,
                fmu: &fmu,
            })
        }
    }

    #[test]
    fn test_classify() {
        Tables::new().check(|ns| {
            assert_eq!(ns.classify_host_side("wheel_motor"), HostSide::HostInput(1));
            assert_eq!(
            ns.classify_host_side("joint_torque"),
            HostSide::HostOutput(10)
        );
            // Motors take precedence over sensors.
            assert_eq!(ns.classify_host_side("shared"), HostSide::HostInput(2));
            assert_eq!(ns.classify_host_side("theta"), HostSide::Unresolved);
        });
    }

    #[test]
    fn test_sensor_feeds_fmu_input() {
        let binding = Tables::new()
            .check(|ns| ns.resolve_pair("joint_torque", "external_torque"))
            .unwrap();
        assert_eq!(
            binding,
            VariableBinding {
                name: "external_torque".to_owned(),
                vr: 0,
                host: Some(HostSignal::Sensor(10)),
                direction: Direction::Input,
            }
        );
        assert_eq!(binding.key(), "inputs/external_torque");
    }

    #[test]
    fn test_fmu_output_drives_motor_either_order() {
        let tables = Tables::new();
        let forward = tables.check(|ns| ns.resolve_pair("wheel_motor", "tau")).unwrap();
        let reverse = tables.check(|ns| ns.resolve_pair("tau", "wheel_motor")).unwrap();
        assert_eq!(forward, reverse);
        assert_eq!(forward.direction, Direction::Output);
        assert_eq!(forward.host, Some(HostSignal::Motor(1)));
        assert_eq!(forward.vr, 1);
    }

    #[test]
    fn test_unresolved_pairs_are_skipped() {
        let tables = Tables::new();
        let err = tables.check(|ns| ns.resolve_pair("theta", "omega")).unwrap_err();
        assert!(matches!(err, Error::UnresolvedMapping { .. }));
        assert_eq!(err.kind(), crate::ErrorKind::Resolution);

        let err = tables
            .check(|ns| ns.resolve_pair("joint_torque", "nonexistent"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownVariable { name } if name == "nonexistent"));
    }

    #[test]
    fn test_resolve_model() {
        let mut model = ModelConfig::new("pend", "pend.fmu");
        model.io_mapping = vec![
            ("joint_torque".to_owned(), "external_torque".to_owned()),
            ("nothing".to_owned(), "nowhere".to_owned()),
            ("tau".to_owned(), "wheel_motor".to_owned()),
        ];
        model.observed = vec!["theta".to_owned(), "nonexistent".to_owned()];
        model.outputs = vec!["theta".to_owned()];

        let resolution = Tables::new().check(|ns| ns.resolve_model(&model));
        let names: Vec<_> = resolution
            .bindings
            .iter()
            .map(|b| (b.name.as_str(), b.direction))
            .collect();
        assert_eq!(
            names,
            vec![
                ("external_torque", Direction::Input),
                ("tau", Direction::Output),
                ("theta", Direction::Output),
                ("theta", Direction::Observed),
            ]
        );
        assert_eq!(resolution.failures.len(), 2);

        // Duplicate references: the later binding wins in the keyed view.
        let by_ref = resolution.by_reference();
        assert_eq!(by_ref.len(), 3);
        assert_eq!(by_ref[&2].direction, Direction::Observed);
    }
}
