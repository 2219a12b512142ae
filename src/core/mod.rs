//! Core scheduling abstractions and budget accounting.

pub mod budget;
pub mod engine;
pub mod error;
pub mod executor;
pub mod queue;
pub mod task;

pub use budget::ResourceBudget;
pub use engine::{
    AdmissionMode, DispatchOutcome, ExecutedTask, IdleReason, QueueEntryStatus, SchedulerEngine,
    SchedulerMetrics,
};
pub use error::{AppResult, PartiallyConsumed, SchedulerError};
pub use executor::{Consumption, Spawn, TaskBody};
pub use queue::TaskQueue;
pub use task::{ScheduledTask, Scorer, TaskHandle, TaskState};
