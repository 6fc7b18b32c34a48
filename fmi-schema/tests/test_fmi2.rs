//! Test FMI 2.0 schema by parsing the FMI2.xml file.

use fmi_schema::fmi2::{Causality, Fmi2ModelDescription, FmuKind, Variability};

#[test]
#[cfg(feature = "fmi2")]
fn test_fmi2() {
    let test_file = std::env::current_dir()
        .map(|path| path.join("tests/FMI2.xml"))
        .unwrap();
    let xml = std::fs::read_to_string(test_file).unwrap();
    let md: Fmi2ModelDescription = fmi_schema::deserialize(&xml).unwrap();

    assert_eq!(md.fmi_version, "2.0");
    assert_eq!(md.model_name, "BouncingBall");
    assert_eq!(
        md.description.as_deref(),
        Some("This model calculates the trajectory, over time, of a ball dropped from a height of 1 m.")
    );
    assert_eq!(md.guid, "{8c4e810f-3df3-4a00-8276-176fa3c9f003}");
    assert_eq!(md.number_of_event_indicators, 1);
    assert_eq!(md.kind(), Some(FmuKind::ModelExchangeAndCoSimulation));

    let cs = md.co_simulation.as_ref().unwrap();
    assert_eq!(cs.model_identifier, "BouncingBall");
    assert!(cs.can_handle_variable_communication_step_size);
    assert!(cs.can_not_use_memory_management_functions);
    assert!(cs.can_get_and_set_fmu_state);
    assert!(cs.can_serialize_fmu_state);
    assert!(!cs.needs_execution_tool);

    assert_eq!(md.log_category_names(), vec!["logEvents", "logStatusError"]);

    let de = md.default_experiment.as_ref().unwrap();
    assert_eq!(de.start_time, Some(0.0));
    assert_eq!(de.stop_time, Some(3.0));
    assert_eq!(de.step_size, Some(1e-2));
    assert_eq!(de.tolerance, None);

    assert_eq!(md.num_variables(), 6);
    let h = md.model_variable_by_name("h").unwrap();
    assert_eq!(h.value_reference, 1);
    assert_eq!(h.causality, Causality::Output);
    assert_eq!(h.start(), Some(1.0));

    let e = md.model_variable_by_name("e").unwrap();
    assert_eq!(e.variability, Variability::Tunable);
    assert_eq!(e.start(), Some(0.7));

    let inputs: Vec<_> = md
        .model_variables()
        .filter(|sv| sv.causality == Causality::Input)
        .map(|sv| sv.name.as_str())
        .collect();
    assert_eq!(inputs, vec!["u"]);

    assert_eq!(
        md.model_variable_by_name("missing"),
        Err(fmi_schema::Error::VariableNotFound("missing".to_owned()))
    );
}
