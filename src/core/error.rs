//! Error types for scheduler operations.

use thiserror::Error;

use crate::util::serde::{CostVector, TaskId};

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Admission control declined a task that cannot be afforded right now.
    #[error("admission rejected for task {task_id}: {reason}")]
    AdmissionRejected {
        /// Identifier the task would have had.
        task_id: TaskId,
        /// Human-readable reason.
        reason: String,
    },
    /// Queue is full.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// The declared cost is malformed or names an unknown dimension.
    #[error("invalid cost: {0}")]
    InvalidCost(String),
    /// A task body failed. Recorded as the task's terminal state, never
    /// returned from dispatch.
    #[error("task {task_id} failed: {reason}")]
    TaskExecutionFailed {
        /// Failing task.
        task_id: TaskId,
        /// Failure message.
        reason: String,
    },
    /// Construction-time configuration is malformed.
    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),
    /// Runtime or spawner failure.
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Error a task body can return to report that it spent part of its
/// reservation before failing. Only the unspent remainder is credited back.
#[derive(Debug, Error)]
#[error("task failed after consuming {consumed}: {reason}")]
pub struct PartiallyConsumed {
    /// Resources actually spent.
    pub consumed: CostVector,
    /// Failure message.
    pub reason: String,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
