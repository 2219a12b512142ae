//! Tests for utility types

use std::collections::BTreeMap;
use std::time::Duration;

use prometheus_budget_scheduler::util::{Clock, CostVector, ManualClock, Priority, TaskId};

#[test]
fn test_priority_ordering() {
    assert!(Priority::Critical > Priority::High);
    assert!(Priority::High > Priority::Normal);
    assert!(Priority::Normal > Priority::Low);
    assert!(Priority::Low > Priority::BestEffort);
}

#[test]
fn test_priority_serde_names() {
    assert_eq!(serde_json::to_string(&Priority::BestEffort).unwrap(), "\"best_effort\"");
    let parsed: Priority = serde_json::from_str("\"critical\"").unwrap();
    assert_eq!(parsed, Priority::Critical);
}

#[test]
fn test_cost_vector() {
    let cost = CostVector::new().with("api", 5.0).with("mem", 100.0);
    assert_eq!(cost.get("api"), 5.0);
    assert_eq!(cost.get("gpu"), 0.0);
    assert!(!cost.is_free());
    assert!(CostVector::new().with("api", 0.0).is_free());
    assert_eq!(cost.to_string(), "{api=5, mem=100}");
}

#[test]
fn test_cost_vector_scalar() {
    let cost = CostVector::new().with("api", 5.0).with("mem", 100.0);
    let mut weights = BTreeMap::new();
    weights.insert("mem".to_string(), 0.01);
    assert_eq!(cost.scalar(&weights), 6.0);
}

#[test]
fn test_cost_vector_json_is_flat_map() {
    let cost: CostVector = serde_json::from_str(r#"{"api_calls": 2.5}"#).unwrap();
    assert_eq!(cost.get("api_calls"), 2.5);
}

#[test]
fn test_manual_clock_advances() {
    let clock = ManualClock::new();
    let start = clock.now();
    clock.advance(Duration::from_secs(90));
    assert_eq!(clock.now() - start, Duration::from_secs(90));
}

#[test]
fn test_task_id() {
    let id: TaskId = 12345;
    assert_eq!(id, 12345);
}
