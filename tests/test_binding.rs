mod common;

use common::{fake, fake_with, state, K, U, Y};
use fmu_cosim::{fmi2::Fmi2Error, Error, ErrorKind, ErrorPolicy};

#[test_log::test]
fn test_initialize_sequence() {
    let (mut binding, shared) = fake("pend");
    binding
        .initialize(1e-4, &[(K, 2.0), (U, 0.5)], ErrorPolicy::BestEffort)
        .unwrap();

    let state = state(&shared);
    assert_eq!(
        state.calls,
        vec![
            "setup_experiment",
            "enter_initialization_mode",
            "exit_initialization_mode"
        ]
    );
    assert_eq!(state.set_history, vec![(K, 2.0), (U, 0.5)]);
}

#[test_log::test]
fn test_initialize_best_effort_runs_to_completion() {
    let (mut binding, shared) = fake_with("pend", |state| state.fail_enter_init = true);
    let err = binding
        .initialize(1e-4, &[(K, 2.0)], ErrorPolicy::BestEffort)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Abi {
            operation: "fmi2EnterInitializationMode",
            source: Fmi2Error::Error,
            ..
        }
    ));
    let state = state(&shared);
    assert_eq!(state.calls.last(), Some(&"exit_initialization_mode"));
    assert_eq!(state.set_history, vec![(K, 2.0)]);
}

#[test_log::test]
fn test_initialize_fail_fast_aborts() {
    let (mut binding, shared) = fake_with("pend", |state| state.fail_enter_init = true);
    let err = binding
        .initialize(1e-4, &[(K, 2.0)], ErrorPolicy::FailFast)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Abi);
    let state = state(&shared);
    assert_eq!(
        state.calls,
        vec!["setup_experiment", "enter_initialization_mode"]
    );
    assert!(state.set_history.is_empty());
}

#[test_log::test]
fn test_reset_reinitializes() {
    let (mut binding, shared) = fake("pend");
    binding.initialize(1e-4, &[(K, 3.0)], ErrorPolicy::BestEffort).unwrap();
    binding.set_real(Y, 42.0).unwrap();

    binding.reset(1e-4, &[(K, 3.0)], ErrorPolicy::BestEffort).unwrap();
    assert_eq!(binding.get_real(Y).unwrap(), 0.0);
    assert_eq!(binding.get_real(K).unwrap(), 3.0);

    let state = state(&shared);
    assert_eq!(
        &state.calls[3..],
        &[
            "reset",
            "setup_experiment",
            "enter_initialization_mode",
            "exit_initialization_mode"
        ]
    );
}

#[test_log::test]
fn test_value_references() {
    let (binding, _) = fake("pend");
    assert_eq!(binding.value_reference("y").unwrap(), Y);
    assert_eq!(binding.lookup("Y"), None);

    let err = binding.value_reference("nonexistent").unwrap_err();
    assert!(matches!(&err, Error::UnknownVariable { name } if name == "nonexistent"));
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test_log::test]
fn test_do_step_failure_is_reported() {
    let (mut binding, _) = fake_with("pend", |state| state.fail_step_at = Some(0));
    let err = binding.do_step(0.0, 0.01, true).unwrap_err();
    assert_eq!(err.to_string(), "fmi2DoStep failed for pend: Discard");
    // Never retried: the next call is a new step.
    binding.do_step(0.0, 0.01, true).unwrap();
}

#[test_log::test]
fn test_destroy_is_idempotent() {
    let (mut binding, shared) = fake("pend");
    binding.destroy();
    {
        let state = state(&shared);
        assert!(state.terminated);
        assert!(state.freed);
        assert_eq!(state.calls, vec!["terminate"]);
    }
    assert!(binding.is_freed());

    binding.destroy();
    drop(binding);
    assert_eq!(state(&shared).calls, vec!["terminate"]);
}

#[test_log::test]
fn test_calls_after_destroy_fail() {
    let (mut binding, _) = fake("pend");
    binding.destroy();

    let err = binding.get_real(Y).unwrap_err();
    assert!(matches!(&err, Error::Freed(name) if name == "pend"));
    assert!(binding.set_real(U, 1.0).is_err());
    assert!(binding.do_step(0.0, 0.1, true).is_err());
}

#[test_log::test]
fn test_drop_frees() {
    let (binding, shared) = fake("pend");
    drop(binding);
    let state = state(&shared);
    assert!(state.terminated);
    assert!(state.freed);
}
