//! Scheduled tasks, their lifecycle, and the scoring function.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::TaskBody;
use crate::config::ScoringWeights;
use crate::util::serde::{CostVector, Priority, TaskId};

/// Lifecycle state of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Queued, waiting for budget.
    Pending,
    /// Budget debited, body not started yet.
    Reserved,
    /// Body is executing.
    Running,
    /// Body finished successfully.
    Completed,
    /// Body returned an error or panicked.
    Failed(String),
    /// Admission control declined the task.
    Rejected(String),
    /// Withdrawn while still pending.
    Cancelled,
}

impl TaskState {
    /// True for states a task never leaves.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed(_) | Self::Rejected(_) | Self::Cancelled
        )
    }
}

/// Scoring function with the engine's weights and time origin.
///
/// `score = tier * priority_weight + cost * cost_weight - age_minutes * age_weight`;
/// lower scores dispatch first.
#[derive(Debug, Clone)]
pub struct Scorer {
    weights: ScoringWeights,
    epoch: Instant,
}

fn minutes(d: Duration) -> f64 {
    d.as_secs_f64() / 60.0
}

impl Scorer {
    /// Create a scorer whose ordering keys are measured from `epoch`.
    pub const fn new(weights: ScoringWeights, epoch: Instant) -> Self {
        Self { weights, epoch }
    }

    /// Weights in use.
    pub const fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Time-independent part of the score.
    pub fn base(&self, priority: Priority, cost: &CostVector) -> f64 {
        self.weights.tiers.weight(priority).mul_add(
            self.weights.priority_weight,
            cost.scalar(&self.weights.dimension_weights) * self.weights.cost_weight,
        )
    }

    /// Score of a task created at `created_at`, evaluated at `now`.
    pub fn score(&self, base: f64, created_at: Instant, now: Instant) -> f64 {
        base - minutes(now.saturating_duration_since(created_at)) * self.weights.age_weight
    }

    /// Ordering key: the score shifted by the shared age term.
    ///
    /// All tasks age at the same rate, so `score(now) + now_minutes * age_weight`
    /// does not depend on `now` and ordering by it never goes stale.
    pub fn rank(&self, base: f64, created_at: Instant) -> f64 {
        minutes(created_at.saturating_duration_since(self.epoch)).mul_add(self.weights.age_weight, base)
    }
}

/// A task owned by the engine from admission until it leaves the queue.
pub struct ScheduledTask {
    id: TaskId,
    priority: Priority,
    cost: CostVector,
    created_at: Instant,
    base_score: f64,
    rank: f64,
    body: Box<dyn TaskBody>,
    state: watch::Sender<TaskState>,
}

impl ScheduledTask {
    /// Wrap a body in `Pending` state and return the caller's handle with it.
    pub fn new(
        id: TaskId,
        priority: Priority,
        cost: CostVector,
        created_at: Instant,
        scorer: &Scorer,
        body: Box<dyn TaskBody>,
    ) -> (Self, TaskHandle) {
        let (state, rx) = watch::channel(TaskState::Pending);
        let base_score = scorer.base(priority, &cost);
        let rank = scorer.rank(base_score, created_at);
        let handle = TaskHandle {
            id,
            priority,
            cost: cost.clone(),
            state: rx,
        };
        let task = Self {
            id,
            priority,
            cost,
            created_at,
            base_score,
            rank,
            body,
            state,
        };
        (task, handle)
    }

    /// Task identifier.
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Tier.
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Declared cost.
    pub const fn cost(&self) -> &CostVector {
        &self.cost
    }

    /// Admission instant.
    pub const fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time-invariant ordering key.
    pub const fn rank(&self) -> f64 {
        self.rank
    }

    /// Current score.
    pub fn score(&self, scorer: &Scorer, now: Instant) -> f64 {
        scorer.score(self.base_score, self.created_at, now)
    }

    /// Publish a new state to handles.
    pub fn set_state(&self, state: TaskState) {
        self.state.send_replace(state);
    }

    /// Split into the executable part and the state publisher.
    pub(crate) fn into_running(self) -> (RunningTask, watch::Sender<TaskState>) {
        let running = RunningTask {
            id: self.id,
            priority: self.priority,
            cost: self.cost,
            created_at: self.created_at,
            body: self.body,
        };
        (running, self.state)
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("cost", &self.cost)
            .field("rank", &self.rank)
            .finish_non_exhaustive()
    }
}

/// A task taken off the queue for execution.
pub(crate) struct RunningTask {
    pub id: TaskId,
    pub priority: Priority,
    pub cost: CostVector,
    pub created_at: Instant,
    pub body: Box<dyn TaskBody>,
}

/// Caller-side view of a task. Observes state; never mutates the task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    priority: Priority,
    cost: CostVector,
    state: watch::Receiver<TaskState>,
}

impl TaskHandle {
    /// Task identifier.
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Tier.
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Declared cost.
    pub const fn cost(&self) -> &CostVector {
        &self.cost
    }

    /// Latest state.
    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    /// Wait until the task reaches a terminal state.
    ///
    /// Returns the last known state if the engine is dropped first.
    pub async fn wait(&self) -> TaskState {
        let mut rx = self.state.clone();
        let result = rx.wait_for(TaskState::is_terminal).await.map(|s| s.clone());
        result.unwrap_or_else(|_| rx.borrow().clone())
    }
}
