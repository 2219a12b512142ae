//! Tests for the in-memory ready queue

use std::time::{Duration, Instant};

use prometheus_budget_scheduler::config::ScoringWeights;
use prometheus_budget_scheduler::core::{
    AppResult, Consumption, ScheduledTask, SchedulerError, Scorer, TaskQueue,
};
use prometheus_budget_scheduler::infra::queue::ReadyQueue;
use prometheus_budget_scheduler::util::{CostVector, Priority, TaskId};

fn done() -> AppResult<Consumption> {
    Ok(Consumption::Reserved)
}

fn task(scorer: &Scorer, id: TaskId, priority: Priority, api: f64, at: Instant) -> ScheduledTask {
    let (task, _handle) = ScheduledTask::new(
        id,
        priority,
        CostVector::new().with("api", api),
        at,
        scorer,
        Box::new(|| async { done() }),
    );
    task
}

#[test]
fn test_mixed_tiers_come_out_in_tier_order() {
    let epoch = Instant::now();
    let scorer = Scorer::new(ScoringWeights::default(), epoch);
    let mut queue = ReadyQueue::new();
    let tiers = [
        Priority::Low,
        Priority::BestEffort,
        Priority::Critical,
        Priority::Normal,
        Priority::High,
    ];
    for (i, priority) in tiers.iter().enumerate() {
        queue.insert(task(&scorer, i as TaskId + 1, *priority, 1.0, epoch)).unwrap();
    }

    let order: Vec<Priority> = queue.iter_ordered().map(ScheduledTask::priority).collect();
    assert_eq!(
        order,
        vec![
            Priority::Critical,
            Priority::High,
            Priority::Normal,
            Priority::Low,
            Priority::BestEffort,
        ]
    );
}

#[test]
fn test_peek_top_does_not_remove() {
    let epoch = Instant::now();
    let scorer = Scorer::new(ScoringWeights::default(), epoch);
    let mut queue = ReadyQueue::new();
    for id in 1..=10 {
        queue.insert(task(&scorer, id, Priority::Normal, 1.0, epoch)).unwrap();
    }

    let top: Vec<TaskId> = queue.peek_top(3).iter().map(|t| t.id()).collect();
    assert_eq!(top, vec![1, 2, 3]);
    assert_eq!(queue.len(), 10);
    assert_eq!(queue.peek_top(50).len(), 10);
}

#[test]
fn test_aged_task_ahead_of_newer_same_tier() {
    let epoch = Instant::now();
    let scorer = Scorer::new(ScoringWeights::default(), epoch);
    let mut queue = ReadyQueue::new();
    queue
        .insert(task(&scorer, 1, Priority::Normal, 5.0, epoch + Duration::from_secs(600)))
        .unwrap();
    queue.insert(task(&scorer, 2, Priority::Normal, 5.0, epoch)).unwrap();

    assert_eq!(queue.peek_top(1)[0].id(), 2);
}

#[test]
fn test_bounded_queue_rejects_overflow() {
    let epoch = Instant::now();
    let scorer = Scorer::new(ScoringWeights::default(), epoch);
    let mut queue = ReadyQueue::bounded(2);
    queue.insert(task(&scorer, 1, Priority::Normal, 1.0, epoch)).unwrap();
    queue.insert(task(&scorer, 2, Priority::Normal, 1.0, epoch)).unwrap();

    let overflow = queue.insert(task(&scorer, 3, Priority::Critical, 1.0, epoch));
    assert!(matches!(overflow, Err(SchedulerError::QueueFull(_))));
    assert_eq!(queue.max_depth(), Some(2));

    assert!(queue.remove(1).is_some());
    assert!(queue.insert(task(&scorer, 3, Priority::Critical, 1.0, epoch)).is_ok());
}
