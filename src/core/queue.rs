//! Ready-queue abstraction.

use super::{ScheduledTask, SchedulerError};
use crate::util::serde::TaskId;

/// Score-ordered container of pending tasks.
///
/// Implementations order by [`ScheduledTask::rank`] ascending and break ties
/// by task id, which follows admission order.
pub trait TaskQueue: Send {
    /// Insert a task if space permits.
    fn insert(&mut self, task: ScheduledTask) -> Result<(), SchedulerError>;
    /// Up to `k` tasks from the front, without removing them.
    fn peek_top(&self, k: usize) -> Vec<&ScheduledTask>;
    /// Remove a specific task.
    fn remove(&mut self, id: TaskId) -> Option<ScheduledTask>;
    /// All queued tasks in dispatch order.
    fn iter_ordered(&self) -> Box<dyn Iterator<Item = &ScheduledTask> + '_>;
    /// Maximum depth allowed for this queue, if bounded.
    fn max_depth(&self) -> Option<usize>;
    /// Current depth.
    fn len(&self) -> usize;
    /// True when nothing is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
