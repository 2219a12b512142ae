//! Scheduler engine: admission control, bounded-lookahead dispatch, budget
//! reconciliation, and the background refill and dispatch loops.
//!
//! All decisions (admission, candidate scan, reservation, removal from the
//! queue, reconciliation) happen under one `parking_lot::Mutex` that guards
//! the budget, the queue, and the counters together. Task bodies run outside
//! of it, so many of them may execute concurrently.

use std::collections::{BTreeMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;

use super::task::RunningTask;
use super::{
    Consumption, PartiallyConsumed, ResourceBudget, ScheduledTask, SchedulerError, Scorer, Spawn,
    TaskBody, TaskHandle, TaskQueue, TaskState,
};
use crate::config::EngineConfig;
use crate::infra::queue::ReadyQueue;
use crate::util::clock::{Clock, SystemClock};
use crate::util::serde::{from_micro, to_micro, CostVector, Priority, TaskId};

/// What to do with a task the budget cannot cover right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    /// Queue it and let it wait for a refill.
    #[default]
    Enqueue,
    /// Fail fast with `AdmissionRejected`.
    RejectIfNoBudget,
}

/// Why a dispatch round executed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleReason {
    /// Nothing is queued.
    QueueEmpty,
    /// None of the lookahead window fits the budget.
    NoAffordableTaskInWindow,
    /// `max_concurrent_executions` bodies are already running.
    ConcurrencyLimitReached,
}

impl IdleReason {
    /// Stable snake_case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QueueEmpty => "queue_empty",
            Self::NoAffordableTaskInWindow => "no_affordable_task_in_window",
            Self::ConcurrencyLimitReached => "concurrency_limit_reached",
        }
    }
}

/// Summary of a task that was dispatched and ran to a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedTask {
    /// Task identifier.
    pub id: TaskId,
    /// Tier.
    pub priority: Priority,
    /// Reserved cost.
    pub cost: CostVector,
    /// `Completed` or `Failed`.
    pub state: TaskState,
    /// Time spent queued before dispatch.
    pub waited: Duration,
    /// Resources counted as spent after reconciliation.
    pub spent: CostVector,
}

/// Result of one dispatch round.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A task was dispatched and finished.
    Executed(ExecutedTask),
    /// Nothing ran; the queue and budget are unchanged.
    Idle(IdleReason),
}

impl DispatchOutcome {
    /// The executed task, if any.
    pub const fn executed(&self) -> Option<&ExecutedTask> {
        match self {
            Self::Executed(task) => Some(task),
            Self::Idle(_) => None,
        }
    }

    /// Why nothing ran, if nothing ran.
    pub const fn reason_if_none(&self) -> Option<IdleReason> {
        match self {
            Self::Executed(_) => None,
            Self::Idle(reason) => Some(*reason),
        }
    }
}

/// Point-in-time counters and budget view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerMetrics {
    /// Engine name.
    pub name: String,
    /// Tasks currently queued.
    pub queue_size: usize,
    /// Tasks admitted into the queue.
    pub tasks_queued_total: u64,
    /// Tasks whose body completed successfully.
    pub tasks_executed_total: u64,
    /// Tasks whose body failed or panicked.
    pub tasks_failed_total: u64,
    /// Submissions refused at admission.
    pub tasks_rejected_total: u64,
    /// Tasks skipped at least once during a lookahead scan because they were
    /// unaffordable. A task counts once however many rounds skip it.
    pub tasks_deferred_total: u64,
    /// Pending tasks withdrawn by the caller.
    pub tasks_cancelled_total: u64,
    /// Bodies running right now.
    pub running_tasks: usize,
    /// Resources reserved by running tasks.
    pub current_usage_per_dimension: BTreeMap<String, f64>,
    /// Resources counted as spent by finished tasks.
    pub total_cost_spent_per_dimension: BTreeMap<String, f64>,
    /// Tokens available now.
    pub tokens_available_per_dimension: BTreeMap<String, f64>,
}

/// One queued task as seen by `get_queue_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntryStatus {
    /// Task identifier.
    pub id: TaskId,
    /// Tier.
    pub priority: Priority,
    /// Declared cost.
    pub cost: CostVector,
    /// Time since admission.
    pub waiting_time: Duration,
    /// Score evaluated now.
    pub current_score: f64,
}

#[derive(Debug, Default)]
struct Counters {
    queued: u64,
    executed: u64,
    failed: u64,
    rejected: u64,
    deferred: u64,
    cancelled: u64,
}

struct EngineState<Q> {
    budget: ResourceBudget,
    queue: Q,
    counters: Counters,
    next_id: TaskId,
    running: usize,
    in_flight: BTreeMap<String, u64>,
    spent: BTreeMap<String, u64>,
    /// Queued tasks already counted as deferred.
    deferred_ids: HashSet<TaskId>,
}

impl<Q> EngineState<Q> {
    fn track_in_flight(&mut self, cost: &CostVector, add: bool) {
        for (dimension, amount) in cost.iter() {
            let entry = self.in_flight.entry(dimension.to_string()).or_default();
            let micro = to_micro(amount);
            *entry = if add {
                entry.saturating_add(micro)
            } else {
                entry.saturating_sub(micro)
            };
        }
    }

    fn record_spent(&mut self, spent: &CostVector) {
        for (dimension, amount) in spent.iter() {
            let entry = self.spent.entry(dimension.to_string()).or_default();
            *entry = entry.saturating_add(to_micro(amount));
        }
    }
}

struct EngineInner<Q> {
    config: EngineConfig,
    scorer: Scorer,
    clock: Arc<dyn Clock>,
    state: Mutex<EngineState<Q>>,
    work_available: Notify,
    shutdown: watch::Sender<bool>,
}

/// Cost-aware scheduler. Cloning yields another handle to the same engine;
/// separately constructed engines share nothing.
pub struct SchedulerEngine<Q = ReadyQueue> {
    inner: Arc<EngineInner<Q>>,
}

impl<Q> Clone for SchedulerEngine<Q> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SchedulerEngine<ReadyQueue> {
    /// Build an engine on the system clock.
    pub fn new(config: EngineConfig) -> Result<Self, SchedulerError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build an engine on a custom clock.
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, SchedulerError> {
        let queue = config
            .max_queue_depth
            .map_or_else(ReadyQueue::new, ReadyQueue::bounded);
        Self::with_queue(config, queue, clock)
    }
}

impl<Q> SchedulerEngine<Q>
where
    Q: TaskQueue + 'static,
{
    /// Build an engine around a caller-supplied queue.
    pub fn with_queue(
        config: EngineConfig,
        queue: Q,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SchedulerError> {
        config
            .validate()
            .map_err(SchedulerError::ConfigurationInvalid)?;
        let now = clock.now();
        let budget = ResourceBudget::new(&config.dimensions, now);
        let scorer = Scorer::new(config.scoring.clone(), now);
        let (shutdown, _) = watch::channel(false);
        tracing::info!(
            "engine `{}` created with dimensions {:?}",
            config.name,
            budget.available_snapshot()
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                scorer,
                clock,
                state: Mutex::new(EngineState {
                    budget,
                    queue,
                    counters: Counters::default(),
                    next_id: 0,
                    running: 0,
                    in_flight: BTreeMap::new(),
                    spent: BTreeMap::new(),
                    deferred_ids: HashSet::new(),
                }),
                work_available: Notify::new(),
                shutdown,
            }),
        })
    }

    /// Engine name.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Validated configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Submit a task.
    ///
    /// With [`AdmissionMode::RejectIfNoBudget`] a task the budget cannot
    /// afford right now fails with `AdmissionRejected` and is never queued.
    /// Otherwise it is queued and waits for a refill if needed.
    pub fn schedule<B>(
        &self,
        priority: Priority,
        cost: CostVector,
        admission: AdmissionMode,
        body: B,
    ) -> Result<TaskHandle, SchedulerError>
    where
        B: TaskBody,
    {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        state.next_id += 1;
        let id = state.next_id;

        if let Err(reason) = cost
            .validate()
            .and_then(|()| state.budget.check_dimensions(&cost))
        {
            state.counters.rejected += 1;
            tracing::warn!("task {} refused: {}", id, reason);
            return Err(SchedulerError::InvalidCost(reason));
        }

        let created_at = self.inner.clock.now();
        let (task, handle) = ScheduledTask::new(
            id,
            priority,
            cost,
            created_at,
            &self.inner.scorer,
            Box::new(body),
        );

        if admission == AdmissionMode::RejectIfNoBudget && !state.budget.can_afford(task.cost()) {
            state.counters.rejected += 1;
            let reason = format!(
                "requires {}, available {:?}",
                task.cost(),
                state.budget.available_snapshot()
            );
            tracing::info!("task {} rejected at admission: {}", id, reason);
            task.set_state(TaskState::Rejected(reason.clone()));
            return Err(SchedulerError::AdmissionRejected { task_id: id, reason });
        }

        if state.budget.exceeds_capacity(task.cost()) {
            tracing::warn!(
                "task {} costs {} which exceeds budget capacity; it cannot be dispatched",
                id,
                task.cost()
            );
        }

        if let Err(e) = state.queue.insert(task) {
            state.counters.rejected += 1;
            tracing::warn!("task {} rejected: {}", id, e);
            return Err(e);
        }
        state.counters.queued += 1;
        drop(guard);

        tracing::info!("task {} ({}) enqueued", id, priority);
        self.inner.work_available.notify_one();
        Ok(handle)
    }

    /// Withdraw a pending task. Returns false if it is not queued (already
    /// dispatched, finished, or unknown). Has no budget effect.
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.inner.state.lock();
        let Some(task) = state.queue.remove(id) else {
            return false;
        };
        state.counters.cancelled += 1;
        state.deferred_ids.remove(&id);
        drop(state);
        task.set_state(TaskState::Cancelled);
        tracing::info!("task {} cancelled", id);
        true
    }

    /// Dispatch at most one task and run it to completion.
    ///
    /// Scans the lookahead window in score order and runs the first task the
    /// budget can reserve. A failing body is recorded, never propagated.
    pub async fn execute_next(&self) -> DispatchOutcome {
        match self.try_claim() {
            Ok((task, claim)) => DispatchOutcome::Executed(self.run_claimed(task, claim).await),
            Err(reason) => DispatchOutcome::Idle(reason),
        }
    }

    /// Dispatch until a round executes nothing. Returns the number of tasks run.
    pub async fn execute_all(&self) -> usize {
        let mut executed = 0;
        while self.execute_next().await.executed().is_some() {
            executed += 1;
        }
        executed
    }

    /// Pick, reserve, and dequeue one task. Synchronous: the whole decision
    /// happens under the state lock. The returned [`Claim`] owns the
    /// reservation from here on.
    fn try_claim(&self) -> Result<(RunningTask, Claim<Q>), IdleReason> {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        if state.queue.is_empty() {
            return Err(IdleReason::QueueEmpty);
        }
        if let Some(max) = self.inner.config.max_concurrent_executions {
            if state.running >= max {
                tracing::debug!("dispatch blocked: {} of {} slots busy", state.running, max);
                return Err(IdleReason::ConcurrencyLimitReached);
            }
        }

        let now = self.inner.clock.now();
        let window = self.inner.config.lookahead_window_size;
        let mut chosen = None;
        for candidate in state.queue.peek_top(window) {
            if state.budget.reserve(candidate.cost()) {
                chosen = Some((candidate.id(), candidate.cost().clone()));
                break;
            }
            if state.deferred_ids.insert(candidate.id()) {
                state.counters.deferred += 1;
            }
            tracing::debug!(
                "task {} (score {:.3}) unaffordable, deferring",
                candidate.id(),
                candidate.score(&self.inner.scorer, now)
            );
        }

        let Some((id, cost)) = chosen else {
            return Err(IdleReason::NoAffordableTaskInWindow);
        };
        let Some(task) = state.queue.remove(id) else {
            state.budget.release(&cost);
            return Err(IdleReason::NoAffordableTaskInWindow);
        };
        task.set_state(TaskState::Reserved);
        state.running += 1;
        state.track_in_flight(&cost, true);
        state.deferred_ids.remove(&id);
        tracing::debug!("task {} reserved {}", id, cost);
        let (running, status) = task.into_running();
        let claim = Claim {
            engine: self.clone(),
            id,
            cost,
            status,
            settled: false,
        };
        Ok((running, claim))
    }

    /// Execute a claimed task and reconcile its reservation.
    async fn run_claimed(&self, task: RunningTask, claim: Claim<Q>) -> ExecutedTask {
        let RunningTask {
            id,
            priority,
            cost,
            created_at,
            body,
        } = task;
        let waited = self.inner.clock.now().saturating_duration_since(created_at);
        claim.status.send_replace(TaskState::Running);
        tracing::info!("task {} ({}) started after {:?}", id, priority, waited);

        let result = AssertUnwindSafe(body.run()).catch_unwind().await;
        let (final_state, spent) = match result {
            Ok(Ok(Consumption::Reserved)) => (TaskState::Completed, cost.clone()),
            Ok(Ok(Consumption::Actual(actual))) => {
                (TaskState::Completed, actual.clamped_to(&cost))
            }
            Ok(Err(err)) => {
                let spent = err
                    .chain()
                    .find_map(|e| e.downcast_ref::<PartiallyConsumed>())
                    .map_or_else(CostVector::new, |p| p.consumed.clamped_to(&cost));
                (TaskState::Failed(format!("{err:#}")), spent)
            }
            Err(panic) => (
                TaskState::Failed(panic_message(panic.as_ref())),
                CostVector::new(),
            ),
        };

        match &final_state {
            TaskState::Failed(reason) => tracing::warn!(
                "{}",
                SchedulerError::TaskExecutionFailed {
                    task_id: id,
                    reason: reason.clone(),
                }
            ),
            _ => tracing::info!("task {} completed, spent {}", id, spent),
        }
        claim.settle(final_state.clone(), &spent);

        ExecutedTask {
            id,
            priority,
            cost,
            state: final_state,
            waited,
            spent,
        }
    }

    /// Return a finished reservation to the budget and update the counters.
    fn reconcile(&self, reserved: &CostVector, spent: &CostVector, completed: bool) {
        let mut state = self.inner.state.lock();
        state.budget.settle(reserved, spent);
        state.running = state.running.saturating_sub(1);
        state.track_in_flight(reserved, false);
        state.record_spent(spent);
        if completed {
            state.counters.executed += 1;
        } else {
            state.counters.failed += 1;
        }
    }

    /// Refill the budget up to the current clock reading.
    pub fn refill(&self) {
        let now = self.inner.clock.now();
        self.inner.state.lock().budget.refill_until(now);
    }

    /// Spawn the background refill loop, ticking every `refill_interval_ms`.
    ///
    /// The loop holds only a weak reference and stops on [`shutdown`](Self::shutdown)
    /// or once every engine handle is dropped.
    pub fn start_refill<S: Spawn>(&self, spawner: &S) {
        let weak = Arc::downgrade(&self.inner);
        let mut shutdown = self.inner.shutdown.subscribe();
        let period = self.inner.config.refill_interval();
        let name = self.inner.config.name.clone();
        spawner.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            while !*shutdown.borrow() {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(engine) = Self::upgrade(&weak) else { break };
                        engine.refill();
                        engine.inner.work_available.notify_one();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("refill loop for `{}` stopped", name);
        });
    }

    /// Spawn a dispatcher that claims tasks and runs each on its own spawned
    /// future, so bodies execute concurrently up to `max_concurrent_executions`.
    pub fn start_dispatcher<S>(&self, spawner: &S)
    where
        S: Spawn + Clone + Send + 'static,
    {
        let weak = Arc::downgrade(&self.inner);
        let mut shutdown = self.inner.shutdown.subscribe();
        let idle = self.inner.config.dispatch_interval();
        let name = self.inner.config.name.clone();
        let runner = spawner.clone();
        spawner.spawn(async move {
            while !*shutdown.borrow() {
                let Some(engine) = Self::upgrade(&weak) else { break };
                if let Ok((task, claim)) = engine.try_claim() {
                    let worker = engine.clone();
                    runner.spawn(async move {
                        worker.run_claimed(task, claim).await;
                    });
                    continue;
                }
                let wake = Arc::clone(&engine.inner);
                drop(engine);
                tokio::select! {
                    () = tokio::time::sleep(idle) => {}
                    () = wake.work_available.notified() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("dispatcher for `{}` stopped", name);
        });
    }

    fn upgrade(weak: &Weak<EngineInner<Q>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Stop background loops started by this engine.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
        tracing::info!("engine `{}` shutting down", self.inner.config.name);
    }

    /// Read-only view of available tokens.
    pub fn budget_snapshot(&self) -> BTreeMap<String, f64> {
        self.inner.state.lock().budget.available_snapshot()
    }

    /// Counters and budget state.
    pub fn get_metrics(&self) -> SchedulerMetrics {
        let state = self.inner.state.lock();
        let per_dimension = |source: &BTreeMap<String, u64>| -> BTreeMap<String, f64> {
            state
                .budget
                .dimensions()
                .map(|d| (d.to_string(), from_micro(source.get(d).copied().unwrap_or(0))))
                .collect()
        };
        SchedulerMetrics {
            name: self.inner.config.name.clone(),
            queue_size: state.queue.len(),
            tasks_queued_total: state.counters.queued,
            tasks_executed_total: state.counters.executed,
            tasks_failed_total: state.counters.failed,
            tasks_rejected_total: state.counters.rejected,
            tasks_deferred_total: state.counters.deferred,
            tasks_cancelled_total: state.counters.cancelled,
            running_tasks: state.running,
            current_usage_per_dimension: per_dimension(&state.in_flight),
            total_cost_spent_per_dimension: per_dimension(&state.spent),
            tokens_available_per_dimension: state.budget.available_snapshot(),
        }
    }

    /// Queued tasks in dispatch order, with scores evaluated now.
    pub fn get_queue_status(&self) -> Vec<QueueEntryStatus> {
        let now = self.inner.clock.now();
        let state = self.inner.state.lock();
        state
            .queue
            .iter_ordered()
            .map(|task| QueueEntryStatus {
                id: task.id(),
                priority: task.priority(),
                cost: task.cost().clone(),
                waiting_time: now.saturating_duration_since(task.created_at()),
                current_score: task.score(&self.inner.scorer, now),
            })
            .collect()
    }
}

/// Reservation held by a dispatched task until it is reconciled.
///
/// Dropping it unsettled, as happens when the dispatch future is cancelled,
/// credits the whole reservation back and fails the task.
struct Claim<Q: TaskQueue + 'static> {
    engine: SchedulerEngine<Q>,
    id: TaskId,
    cost: CostVector,
    status: watch::Sender<TaskState>,
    settled: bool,
}

impl<Q: TaskQueue + 'static> Claim<Q> {
    fn settle(mut self, final_state: TaskState, spent: &CostVector) {
        self.settled = true;
        self.engine
            .reconcile(&self.cost, spent, final_state == TaskState::Completed);
        self.status.send_replace(final_state);
        self.engine.inner.work_available.notify_one();
    }
}

impl<Q: TaskQueue + 'static> Drop for Claim<Q> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        tracing::warn!("task {} dispatch cancelled, releasing {}", self.id, self.cost);
        self.engine.reconcile(&self.cost, &CostVector::new(), false);
        self.status
            .send_replace(TaskState::Failed("dispatch cancelled".into()));
        self.engine.inner.work_available.notify_one();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(|| "task panicked".to_string(), |m| format!("task panicked: {m}"))
}
