//! Runner - claim → run → reschedule のポーリングループ
//!
//! # フロー（1 tick）
//! 1. 実行中のタスクがある、または停止中なら何もしない（プロセス内で単一実行）
//! 2. `TaskStore::claim_next()` で実行可能なタスクを 1 件だけ原子的に確保
//!    （`run_since` を `now + lock_duration` に進める = リース）
//! 3. `Task::next_time()` を実行前に取得し、`Task::run()` を実行
//! 4. 成功: `run_since` を次回時刻へ / 失敗: `next_time_after_fail()` へ
//! 5. バックログが空になるまで 2 に戻る
//!
//! 複数プロセス間の排他は `claim_next` の原子性だけで保証されます。

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::builder::RunnerBuilder;
use super::config::RunnerConfig;
use super::progress::Progress;
use crate::domain::{
    ClaimQuery, RegistrationError, RunnerError, RunnerEvent, StoreError, TaskError, TaskId,
    TaskRecord, UpsertOutcome,
};
use crate::ports::{Clock, EventSink, TaskStore};
use crate::task::Task;

/// Executes registered tasks against a shared [`TaskStore`].
///
/// Any number of runners (in one process or many) may share a store; the
/// registry of local tasks is owned by each runner. Cloning a `Runner`
/// yields another handle to the same runner.
#[derive(Clone)]
pub struct Runner {
    shared: Arc<RunnerShared>,
}

pub(crate) struct RunnerShared {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    config: RunnerConfig,

    /// Local registry (task id -> task). Last registration wins.
    tasks: RwLock<HashMap<TaskId, Arc<dyn Task>>>,

    /// Last lease renewal per task id.
    last_progress: Mutex<HashMap<TaskId, DateTime<Utc>>>,

    triggering: AtomicBool,
    executing: AtomicBool,
    /// Signalled whenever the execution slot is released.
    idle: Notify,
    ticker: Mutex<Option<JoinHandle<()>>>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainMode {
    /// Timer driven; stop claiming once triggering is switched off.
    UntilStopped,
    /// One-shot drain requested by the host.
    Backlog,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks the runner as executing for as long as it is alive.
struct ExecutionSlot {
    runner: Arc<RunnerShared>,
}

impl ExecutionSlot {
    fn acquire(runner: &Arc<RunnerShared>) -> Option<Self> {
        runner
            .executing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                runner: Arc::clone(runner),
            })
    }
}

impl Drop for ExecutionSlot {
    fn drop(&mut self) {
        self.runner.executing.store(false, Ordering::Release);
        self.runner.idle.notify_waiters();
    }
}

impl Runner {
    pub fn builder(store: Arc<dyn TaskStore>) -> RunnerBuilder {
        RunnerBuilder::new(store)
    }

    pub(crate) fn from_parts(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            shared: Arc::new(RunnerShared {
                store,
                clock,
                events,
                config,
                tasks: RwLock::new(HashMap::new()),
                last_progress: Mutex::new(HashMap::new()),
                triggering: AtomicBool::new(false),
                executing: AtomicBool::new(false),
                idle: Notify::new(),
                ticker: Mutex::new(None),
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.shared.config
    }

    /// Make sure the store can answer claim queries efficiently.
    pub async fn init(&self) -> Result<(), RunnerError> {
        self.shared.store.ensure_claim_index().await?;
        Ok(())
    }

    /// Register `task` locally and make sure its record exists.
    ///
    /// A blank id is rejected before the registry or the store is touched.
    /// An existing record only gets its priority overwritten.
    pub async fn register_task(
        &self,
        task: Arc<dyn Task>,
        priority: i64,
    ) -> Result<UpsertOutcome, RunnerError> {
        let task_id = TaskId::new(task.task_id()).map_err(RegistrationError::from)?;

        self.shared
            .tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_id.clone(), task);

        let record = TaskRecord::new(task_id.clone(), priority, self.shared.clock.now());
        let outcome = self.shared.store.upsert(record).await?;
        debug!(%task_id, priority, ?outcome, "task registered");
        Ok(outcome)
    }

    /// Tasks known to this runner.
    pub fn tasks(&self) -> Vec<Arc<dyn Task>> {
        self.shared
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Start polling every `poll_interval`, with one attempt right away.
    ///
    /// Calling it again restarts the timer. Must be called within a tokio
    /// runtime.
    pub fn start_triggering_tasks(&self) {
        self.shared.abort_ticker();
        self.shared.triggering.store(true, Ordering::Release);

        let period = self.shared.config.poll_interval();
        let runner = Arc::downgrade(&self.shared);
        let ticker = tokio::spawn(poll_timer(runner, period));
        *lock(&self.shared.ticker) = Some(ticker);

        self.shared.run_next();
    }

    /// Stop polling and wait for the execution in flight, if any.
    ///
    /// Both a timer-driven drain and a concurrent [`run_due_tasks`] call are
    /// awaited; the latter still finishes its backlog. A running task is
    /// never interrupted.
    ///
    /// [`run_due_tasks`]: Runner::run_due_tasks
    pub async fn stop_triggering_tasks(&self) {
        self.shared.triggering.store(false, Ordering::Release);
        self.shared.abort_ticker();

        let in_flight = lock(&self.shared.in_flight).take();
        if let Some(handle) = in_flight
            && let Err(err) = handle.await
        {
            warn!(error = %err, "in-flight execution ended abnormally");
        }

        self.shared.wait_idle().await;
    }

    pub fn is_triggering(&self) -> bool {
        self.shared.triggering.load(Ordering::Acquire)
    }

    pub fn is_executing(&self) -> bool {
        self.shared.executing.load(Ordering::Acquire)
    }

    /// Execute every task that is eligible now, one after another, without
    /// the timer. Returns 0 right away if this runner is already executing.
    pub async fn run_due_tasks(&self) -> usize {
        let Some(_slot) = ExecutionSlot::acquire(&self.shared) else {
            return 0;
        };
        self.shared.drain(DrainMode::Backlog).await
    }
}

async fn poll_timer(runner: Weak<RunnerShared>, period: std::time::Duration) {
    let start = tokio::time::Instant::now() + period;
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(runner) = runner.upgrade() else {
            break;
        };
        runner.run_next();
    }
}

impl RunnerShared {
    fn abort_ticker(&self) {
        if let Some(ticker) = lock(&self.ticker).take() {
            ticker.abort();
        }
    }

    async fn wait_idle(&self) {
        loop {
            let mut idle = std::pin::pin!(self.idle.notified());
            // register before checking so a release in between is not missed
            idle.as_mut().enable();
            if !self.executing.load(Ordering::Acquire) {
                return;
            }
            idle.await;
        }
    }

    fn task(&self, task_id: &TaskId) -> Option<Arc<dyn Task>> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task_id)
            .cloned()
    }

    /// One poll tick.
    fn run_next(self: &Arc<Self>) {
        if !self.triggering.load(Ordering::Acquire) {
            return;
        }

        // hold the slot lock so a finished drain can't overwrite a newer handle
        let mut in_flight = lock(&self.in_flight);
        let Some(slot) = ExecutionSlot::acquire(self) else {
            return;
        };

        let runner = Arc::clone(self);
        *in_flight = Some(tokio::spawn(async move {
            let _slot = slot;
            runner.drain(DrainMode::UntilStopped).await;
        }));
    }

    /// Claim and execute until nothing is eligible. Caller owns the slot.
    async fn drain(self: &Arc<Self>, mode: DrainMode) -> usize {
        let mut executed = 0;
        loop {
            if mode == DrainMode::UntilStopped && !self.triggering.load(Ordering::Acquire) {
                break;
            }

            match self.claim_next().await {
                Ok(Some(record)) => {
                    self.execute(record).await;
                    executed += 1;
                }
                Ok(None) => {
                    debug!(executed, "no task ready");
                    break;
                }
                Err(err) => {
                    error!(error = %err, "claiming next task failed");
                    break;
                }
            }
        }
        executed
    }

    async fn claim_next(&self) -> Result<Option<TaskRecord>, StoreError> {
        let known_ids: Vec<TaskId> = self
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        if known_ids.is_empty() {
            return Ok(None);
        }

        let now = self.clock.now();
        let query = ClaimQuery {
            known_ids,
            now,
            lock_until: lease_until(now, self.config.lock_duration()),
        };
        self.store.claim_next(&query).await
    }

    async fn execute(self: &Arc<Self>, record: TaskRecord) {
        let task_id = record.id;
        let Some(task) = self.task(&task_id) else {
            // filter is built from the registry, so this only happens on a race
            warn!(%task_id, "claimed task is not registered locally; lease left to expire");
            return;
        };

        info!(%task_id, priority = record.priority, "starting task");
        self.events.emit(RunnerEvent::TaskStarted {
            task_id: task_id.clone(),
        });

        match self.invoke(&task_id, Arc::clone(&task)).await {
            Ok(next_time_when_start) => {
                self.finish_task(&task_id, next_time_when_start).await;
                info!(%task_id, "task has finished");
                self.events.emit(RunnerEvent::TaskFinished { task_id });
            }
            Err(err) => {
                error!(%task_id, error = %err, "error while running task");
                self.events.emit(RunnerEvent::TaskError {
                    task_id: task_id.clone(),
                    error: err.to_string(),
                });
                self.on_task_fail(&task_id, task.as_ref()).await;
            }
        }
    }

    /// Read the next time, then run the task on its own tokio task so a
    /// panic surfaces as an ordinary failure.
    async fn invoke(
        self: &Arc<Self>,
        task_id: &TaskId,
        task: Arc<dyn Task>,
    ) -> Result<DateTime<Utc>, TaskError> {
        let next_time_when_start = task.next_time()?;
        let progress = Progress::new(task_id.clone(), Arc::clone(self));

        let handle = tokio::spawn(async move { task.run(progress).await });
        match handle.await {
            Ok(result) => result.map(|()| next_time_when_start),
            Err(err) if err.is_panic() => {
                let payload = err.into_panic();
                Err(TaskError::new(format!(
                    "task panicked: {}",
                    panic_message(payload.as_ref())
                )))
            }
            Err(err) => Err(TaskError::with_source("task was cancelled", err)),
        }
    }

    async fn finish_task(&self, task_id: &TaskId, next_time_when_start: DateTime<Utc>) {
        // overran its own period: eligible right away instead of keeping the
        // claim lease until it expires
        let run_since = next_time_when_start.max(self.clock.now());

        if let Err(err) = self.write_run_since(task_id, run_since).await {
            warn!(%task_id, error = %err, "rescheduling failed; task stays leased until the lock expires");
        }
    }

    async fn on_task_fail(&self, task_id: &TaskId, task: &dyn Task) {
        let next_time = match task.next_time_after_fail() {
            Ok(next_time) => next_time,
            Err(err) => {
                warn!(%task_id, error = %err, "no retry time; task stays leased until the lock expires");
                return;
            }
        };

        if let Err(err) = self.write_run_since(task_id, next_time).await {
            warn!(%task_id, error = %err, "rescheduling after failure failed; task stays leased until the lock expires");
        }
    }

    async fn write_run_since(
        &self,
        task_id: &TaskId,
        run_since: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if !self.store.set_run_since(task_id, run_since).await? {
            warn!(%task_id, "task record disappeared from the store");
        }
        Ok(())
    }

    pub(crate) async fn on_task_progress(&self, task_id: &TaskId) {
        let now = self.clock.now();
        {
            let mut last_progress = lock(&self.last_progress);
            let due = last_progress
                .get(task_id)
                .is_none_or(|last| now - *last > self.config.progress_write_delay());
            if !due {
                return;
            }
            last_progress.insert(task_id.clone(), now);
        }

        let run_since = lease_until(now, self.config.lock_duration());
        if let Err(err) = self.write_run_since(task_id, run_since).await {
            debug!(%task_id, error = %err, "lease renewal failed; ignoring");
        }
    }
}

impl Drop for RunnerShared {
    fn drop(&mut self) {
        self.abort_ticker();
    }
}

/// `now + lock`, saturating at the latest representable instant.
fn lease_until(now: DateTime<Utc>, lock: Duration) -> DateTime<Utc> {
    now.checked_add_signed(lock).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
