//! Tests for error types

use prometheus_budget_scheduler::core::{PartiallyConsumed, SchedulerError};
use prometheus_budget_scheduler::util::CostVector;

#[test]
fn test_queue_full_error() {
    let err = SchedulerError::QueueFull("test_engine".to_string());
    assert_eq!(format!("{}", err), "queue full: test_engine");
}

#[test]
fn test_admission_rejected_error() {
    let err = SchedulerError::AdmissionRejected {
        task_id: 7,
        reason: "requires {api=5}".into(),
    };
    assert_eq!(
        format!("{}", err),
        "admission rejected for task 7: requires {api=5}"
    );
}

#[test]
fn test_task_execution_failed_error() {
    let err = SchedulerError::TaskExecutionFailed {
        task_id: 3,
        reason: "timeout".into(),
    };
    assert_eq!(format!("{}", err), "task 3 failed: timeout");
}

#[test]
fn test_configuration_invalid_error() {
    let err = SchedulerError::ConfigurationInvalid("no dimensions".into());
    assert_eq!(format!("{}", err), "configuration invalid: no dimensions");
}

#[test]
fn test_partially_consumed_survives_context() {
    let err = anyhow::Error::new(PartiallyConsumed {
        consumed: CostVector::new().with("api", 2.0),
        reason: "stream cut off".into(),
    })
    .context("calling upstream");

    let found = err
        .chain()
        .find_map(|e| e.downcast_ref::<PartiallyConsumed>())
        .map(|p| p.consumed.get("api"));
    assert_eq!(found, Some(2.0));
}
