//! In-memory ready queue ordered by score.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::core::{ScheduledTask, SchedulerError, TaskQueue};
use crate::util::serde::TaskId;

/// Ordering key: rank ascending, then id (FIFO among equal ranks).
#[derive(Debug, Clone, Copy)]
struct QueueKey {
    rank: f64,
    id: TaskId,
}

impl PartialEq for QueueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueKey {}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .total_cmp(&other.rank)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// In-memory queue backed by a `BTreeMap`.
/// Insert and remove are O(log n); peeking the front K is O(K).
#[derive(Debug, Default)]
pub struct ReadyQueue {
    max_depth: Option<usize>,
    tasks: BTreeMap<QueueKey, ScheduledTask>,
    keys: HashMap<TaskId, QueueKey>,
}

impl ReadyQueue {
    /// Create an unbounded queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue holding at most `max_depth` tasks.
    pub fn bounded(max_depth: usize) -> Self {
        Self {
            max_depth: Some(max_depth),
            ..Self::default()
        }
    }

    /// Whether a task with this id is queued.
    pub fn contains(&self, id: TaskId) -> bool {
        self.keys.contains_key(&id)
    }
}

impl TaskQueue for ReadyQueue {
    fn insert(&mut self, task: ScheduledTask) -> Result<(), SchedulerError> {
        if self.max_depth.is_some_and(|max| self.tasks.len() >= max) {
            return Err(SchedulerError::QueueFull("max queue depth reached".into()));
        }
        let key = QueueKey {
            rank: task.rank(),
            id: task.id(),
        };
        if let Some(previous) = self.keys.insert(key.id, key) {
            // Same id inserted twice: keep only the newest entry.
            self.tasks.remove(&previous);
        }
        self.tasks.insert(key, task);
        Ok(())
    }

    fn peek_top(&self, k: usize) -> Vec<&ScheduledTask> {
        self.tasks.values().take(k).collect()
    }

    fn remove(&mut self, id: TaskId) -> Option<ScheduledTask> {
        let key = self.keys.remove(&id)?;
        self.tasks.remove(&key)
    }

    fn iter_ordered(&self) -> Box<dyn Iterator<Item = &ScheduledTask> + '_> {
        Box::new(self.tasks.values())
    }

    fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }
}
