//! Scheduler - タスク投入・状態照会・完了待ちの表面
//!
//! Owns the queue, the admission gate, the registry and the completion
//! barrier, and runs the worker pool over them.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::barrier::CompletionBarrier;
use crate::app::builder::SchedulerBuilder;
use crate::app::gate::AdmissionGate;
use crate::app::registry::TaskRegistry;
use crate::app::status::StatusCounts;
use crate::app::worker::WorkerGroup;
use crate::config::SchedulerConfig;
use crate::domain::{TaskError, TaskId, TaskParameters, TaskRecord, TaskStatus};
use crate::error::{Result, SchedulerError};
use crate::ports::{Clock, IdGenerator, Queue, TaskHandler};

/// State shared between the scheduler handle and its workers.
pub(crate) struct SchedulerCore {
    pub(crate) queue: Arc<dyn Queue>,
    pub(crate) gate: AdmissionGate,
    pub(crate) registry: TaskRegistry,
    pub(crate) barrier: CompletionBarrier,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
}

impl SchedulerCore {
    /// Register and enqueue a record built by `build(task_id, sequence)`.
    fn submit(
        &self,
        build: impl FnOnce(TaskId, u64) -> TaskRecord,
    ) -> Result<TaskId> {
        if self.queue.is_closed() {
            return Err(SchedulerError::Submission("scheduler is shut down".into()));
        }

        let task_id = self.ids.generate_task_id();
        // barrier first: a waiter must never see zero while this id is queued
        self.barrier.increment();
        if let Err(e) = self.registry.insert_with(task_id, |seq| build(task_id, seq)) {
            self.barrier.decrement();
            return Err(e);
        }

        if !self.queue.enqueue(task_id) {
            // closed between the check above and now: the caller never sees
            // this id, so the record goes too
            self.registry.remove(task_id);
            self.barrier.decrement();
            return Err(SchedulerError::Submission("scheduler is shut down".into()));
        }
        Ok(task_id)
    }

    /// Pending -> Running for the worker that dequeued `task_id`.
    ///
    /// Returns the parameters and attempt number, or `None` if the record is
    /// no longer pending.
    pub(crate) fn begin(&self, task_id: TaskId) -> Option<(TaskParameters, u32)> {
        let now = self.clock.now();
        self.registry
            .update(task_id, |record| {
                record
                    .mark_running(now)
                    .then(|| (record.parameters.clone(), record.attempt))
            })
            .ok()
            .flatten()
    }

    /// Record the handler outcome. Returns whether the record became
    /// terminal; the caller then owes one [`SchedulerCore::release`].
    pub(crate) fn record_outcome(
        &self,
        task_id: TaskId,
        outcome: std::result::Result<serde_json::Value, TaskError>,
    ) -> bool {
        let now = self.clock.now();
        let recorded = self.registry.update(task_id, |record| match outcome {
            Ok(result) => record.mark_succeeded(result, now),
            Err(error) => record.mark_failed(error, now),
        });
        matches!(recorded, Ok(true))
    }

    /// Take a finished task off the barrier. Call after its permit is gone.
    pub(crate) fn release(&self) {
        self.barrier.decrement();
    }
}

enum Lifecycle {
    Idle,
    Running(WorkerGroup),
    Stopped,
}

/// Bounded-concurrency task scheduler.
///
/// # 使用例
/// ```ignore
/// let scheduler = Scheduler::builder()
///     .max_concurrent_tasks(4)
///     .handler(handler_fn(|task_id, params| async move { fetch(task_id, params).await }))
///     .build()?;
///
/// scheduler.start(4)?;
/// let id = scheduler.add_task(params)?;
/// scheduler.wait_for_all_tasks(Duration::from_secs(7200)).await;
/// let record = scheduler.get_task_status(id)?;
/// ```
pub struct Scheduler {
    core: Arc<SchedulerCore>,
    config: SchedulerConfig,
    handler: OnceLock<Arc<dyn TaskHandler>>,
    lifecycle: Mutex<Lifecycle>,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub(crate) fn from_parts(
        core: SchedulerCore,
        config: SchedulerConfig,
        handler: Option<Arc<dyn TaskHandler>>,
    ) -> Self {
        let slot = OnceLock::new();
        if let Some(handler) = handler {
            let _ = slot.set(handler);
        }
        Self {
            core: Arc::new(core),
            config,
            handler: slot,
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn max_concurrent_tasks(&self) -> usize {
        self.core.gate.capacity()
    }

    /// Register the callback invoked for every task.
    ///
    /// Only one handler per scheduler, and only before `start`.
    pub fn set_handler(&self, handler: Arc<dyn TaskHandler>) -> Result<()> {
        let lifecycle = self.lifecycle();
        if !matches!(*lifecycle, Lifecycle::Idle) {
            return Err(SchedulerError::AlreadyStarted);
        }
        self.handler
            .set(handler)
            .map_err(|_| SchedulerError::HandlerAlreadySet)
    }

    /// Alias of [`Scheduler::set_handler`].
    pub fn set_callback(&self, handler: Arc<dyn TaskHandler>) -> Result<()> {
        self.set_handler(handler)
    }

    /// Launch `worker_count` worker loops. Must be called inside a tokio runtime.
    pub fn start(&self, worker_count: usize) -> Result<()> {
        if worker_count == 0 {
            return Err(SchedulerError::WorkerConfiguration(worker_count));
        }
        let mut lifecycle = self.lifecycle();
        if !matches!(*lifecycle, Lifecycle::Idle) {
            return Err(SchedulerError::AlreadyStarted);
        }
        let handler = self
            .handler
            .get()
            .cloned()
            .ok_or(SchedulerError::MissingHandler)?;

        let workers = WorkerGroup::spawn(worker_count, Arc::clone(&self.core), handler);
        info!(
            workers = workers.len(),
            max_concurrent_tasks = self.core.gate.capacity(),
            "scheduler started"
        );
        *lifecycle = Lifecycle::Running(workers);
        Ok(())
    }

    /// Submit a task. Never waits for running capacity.
    pub fn add_task(&self, parameters: TaskParameters) -> Result<TaskId> {
        let now = self.core.clock.now();
        let task_id = self
            .core
            .submit(|task_id, seq| TaskRecord::new(task_id, parameters, seq, now))?;
        debug!(%task_id, "task submitted");
        Ok(task_id)
    }

    /// Submit a task whose parameters are a serializable struct.
    ///
    /// The value must serialize to a JSON object.
    pub fn add_typed_task<T: Serialize>(&self, task: &T) -> Result<TaskId> {
        match serde_json::to_value(task) {
            Ok(serde_json::Value::Object(parameters)) => self.add_task(parameters),
            Ok(other) => Err(SchedulerError::Submission(format!(
                "task parameters must be a JSON object, got {}",
                json_type_name(&other)
            ))),
            Err(e) => Err(SchedulerError::Submission(format!(
                "task parameters are not serializable: {e}"
            ))),
        }
    }

    /// Resubmit a failed task as a new pending record with the same
    /// parameters. The failed record is left as it is.
    pub fn retry_task(&self, task_id: TaskId) -> Result<TaskId> {
        let failed = self.core.registry.get(task_id)?;
        if failed.status != TaskStatus::Failed {
            return Err(SchedulerError::InvalidTransition {
                task_id,
                from: failed.status,
                to: TaskStatus::Pending,
            });
        }

        let now = self.core.clock.now();
        let retry_id = self
            .core
            .submit(|new_id, seq| TaskRecord::retry_of(&failed, new_id, seq, now))?;
        info!(%task_id, %retry_id, attempt = failed.attempt + 1, "task resubmitted");
        Ok(retry_id)
    }

    /// Point-in-time copy of one record.
    pub fn get_task_status(&self, task_id: TaskId) -> Result<TaskRecord> {
        self.core.registry.get(task_id)
    }

    /// Record a failure for a task that has not been handed to a worker.
    ///
    /// Never re-enqueues. Running tasks belong to their worker and are
    /// rejected with `TaskInFlight`; terminal tasks with `InvalidTransition`.
    pub fn handle_task_failure(&self, task_id: TaskId, error: TaskError) -> Result<()> {
        let now = self.core.clock.now();
        self.core.registry.update(task_id, |record| match record.status {
            TaskStatus::Pending => {
                record.mark_failed(error, now);
                Ok(())
            }
            TaskStatus::Running => Err(SchedulerError::TaskInFlight(task_id)),
            from => Err(SchedulerError::InvalidTransition {
                task_id,
                from,
                to: TaskStatus::Failed,
            }),
        })??;

        // a worker that already popped the id skips it in `begin`
        self.core.queue.remove(task_id);
        self.core.release();
        warn!(%task_id, "pending task marked failed by caller");
        Ok(())
    }

    /// Coarse check; may be stale by the time the caller looks at it.
    pub fn is_queue_empty(&self) -> bool {
        self.core.queue.is_empty()
    }

    /// Wait until no task is pending or running, or `timeout` elapses.
    ///
    /// Tasks submitted during the wait are waited for as well. Returns
    /// whether completion was observed in time. Running handlers are never
    /// cancelled.
    pub async fn wait_for_all_tasks(&self, timeout: Duration) -> bool {
        let done = self.core.barrier.wait(timeout).await;
        if !done {
            warn!(
                outstanding = self.core.barrier.outstanding(),
                ?timeout,
                "timed out waiting for tasks"
            );
        }
        done
    }

    /// Pending + running tasks.
    pub fn outstanding(&self) -> usize {
        self.core.barrier.outstanding()
    }

    /// Admission permits currently held.
    pub fn in_flight(&self) -> usize {
        self.core.gate.held()
    }

    pub fn status_counts(&self) -> StatusCounts {
        self.core.registry.counts()
    }

    /// Every record, in submission order.
    pub fn tasks(&self) -> Vec<TaskRecord> {
        self.core.registry.snapshots()
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle(), Lifecycle::Running(_))
    }

    /// Stop accepting work, let in-flight handlers finish and join every
    /// worker. Tasks not yet admitted (queued, or popped by a worker still
    /// waiting for a permit) stay `pending`.
    pub async fn shutdown(&self) {
        self.core.queue.close();
        self.core.gate.close();
        let previous = std::mem::replace(&mut *self.lifecycle(), Lifecycle::Stopped);
        if let Lifecycle::Running(workers) = previous {
            workers.shutdown_and_join().await;
            info!(outstanding = self.core.barrier.outstanding(), "scheduler stopped");
        }
    }

    /// `wait_for_all_tasks` followed by `shutdown`.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let done = self.wait_for_all_tasks(timeout).await;
        self.shutdown().await;
        done
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::handler_fn;
    use serde_json::json;

    fn params(route: &str) -> TaskParameters {
        let mut p = TaskParameters::new();
        p.insert("route".into(), json!(route));
        p
    }

    fn echo_scheduler(capacity: usize) -> Scheduler {
        Scheduler::builder()
            .max_concurrent_tasks(capacity)
            .handler(handler_fn(|_id: TaskId, p: TaskParameters| async move {
                Ok::<_, TaskError>(serde_json::Value::Object(p))
            }))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn add_task_creates_pending_record() {
        let scheduler = echo_scheduler(2);
        let id = scheduler.add_task(params("TPE-NRT")).unwrap();

        let record = scheduler.get_task_status(id).unwrap();
        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(record.parameters, params("TPE-NRT"));
        assert!(!scheduler.is_queue_empty());
        assert_eq!(scheduler.outstanding(), 1);
    }

    #[tokio::test]
    async fn start_requires_handler() {
        let scheduler = Scheduler::builder().build().unwrap();
        assert!(matches!(
            scheduler.start(1),
            Err(SchedulerError::MissingHandler)
        ));
        // failed start leaves the scheduler configurable
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn handler_cannot_be_replaced_or_set_after_start() {
        let scheduler = Scheduler::builder().build().unwrap();
        let handler: Arc<dyn TaskHandler> = Arc::new(handler_fn(
            |_id: TaskId, _p: TaskParameters| async move { Ok::<_, TaskError>(json!(null)) },
        ));

        scheduler.set_handler(Arc::clone(&handler)).unwrap();
        assert!(matches!(
            scheduler.set_callback(Arc::clone(&handler)),
            Err(SchedulerError::HandlerAlreadySet)
        ));

        scheduler.start(1).unwrap();
        assert!(matches!(
            scheduler.set_handler(handler),
            Err(SchedulerError::AlreadyStarted)
        ));
        assert!(matches!(
            scheduler.start(1),
            Err(SchedulerError::AlreadyStarted)
        ));
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn zero_workers_is_rejected() {
        let scheduler = echo_scheduler(1);
        assert!(matches!(
            scheduler.start(0),
            Err(SchedulerError::WorkerConfiguration(0))
        ));
    }

    #[tokio::test]
    async fn typed_task_must_be_an_object() {
        #[derive(Serialize)]
        struct Query {
            from: &'static str,
            to: &'static str,
        }

        let scheduler = echo_scheduler(1);
        let id = scheduler
            .add_typed_task(&Query {
                from: "TPE",
                to: "KIX",
            })
            .unwrap();
        assert_eq!(scheduler.get_task_status(id).unwrap().parameters["to"], "KIX");

        let err = scheduler.add_typed_task(&vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, SchedulerError::Submission(msg) if msg.contains("array")));
    }

    #[tokio::test]
    async fn caller_can_fail_a_pending_task() {
        let scheduler = echo_scheduler(1);
        let id = scheduler.add_task(params("TPE-HND")).unwrap();

        scheduler
            .handle_task_failure(id, TaskError::permanent("route withdrawn"))
            .unwrap();

        let record = scheduler.get_task_status(id).unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.error_info, Some(TaskError::permanent("route withdrawn")));
        assert_eq!(scheduler.outstanding(), 0);

        // the abandoned id leaves the queue with its barrier slot
        assert!(scheduler.wait_for_all_tasks(Duration::from_millis(50)).await);
        assert!(scheduler.is_queue_empty());

        // terminal tasks reject a second failure
        let err = scheduler
            .handle_task_failure(id, TaskError::permanent("again"))
            .unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::InvalidTransition {
                from: TaskStatus::Failed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn abandoned_task_is_skipped_by_workers() {
        let scheduler = echo_scheduler(1);
        let abandoned = scheduler.add_task(params("abandoned")).unwrap();
        let kept = scheduler.add_task(params("kept")).unwrap();
        scheduler
            .handle_task_failure(abandoned, TaskError::permanent("cancelled"))
            .unwrap();

        scheduler.start(1).unwrap();
        assert!(scheduler.wait_for_all_tasks(Duration::from_secs(2)).await);

        let abandoned = scheduler.get_task_status(abandoned).unwrap();
        assert_eq!(abandoned.status, TaskStatus::Failed);
        assert!(abandoned.start_time.is_none());
        assert_eq!(
            scheduler.get_task_status(kept).unwrap().status,
            TaskStatus::Succeeded
        );
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn retry_requires_a_failed_task() {
        let scheduler = echo_scheduler(1);
        let id = scheduler.add_task(params("TPE-OKA")).unwrap();

        let err = scheduler.retry_task(id).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::InvalidTransition {
                from: TaskStatus::Pending,
                to: TaskStatus::Pending,
                ..
            }
        ));

        scheduler
            .handle_task_failure(id, TaskError::transient("rate limited"))
            .unwrap();
        let retry = scheduler.retry_task(id).unwrap();

        let record = scheduler.get_task_status(retry).unwrap();
        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(record.attempt, 2);
        assert_eq!(record.retry_of, Some(id));
        assert_eq!(record.parameters, params("TPE-OKA"));
        assert_eq!(scheduler.get_task_status(id).unwrap().status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn submissions_after_shutdown_are_rejected() {
        let scheduler = echo_scheduler(1);
        scheduler.start(1).unwrap();
        scheduler.shutdown().await;

        let err = scheduler.add_task(params("late")).unwrap_err();
        assert!(matches!(err, SchedulerError::Submission(_)));
        assert!(scheduler.tasks().is_empty());
    }

    /// Open for submissions, but refuses every id, as a queue closed
    /// between the check and the enqueue would.
    struct RejectingQueue;

    #[async_trait::async_trait]
    impl Queue for RejectingQueue {
        fn enqueue(&self, _task_id: TaskId) -> bool {
            false
        }
        async fn dequeue(&self) -> Option<TaskId> {
            None
        }
        fn remove(&self, _task_id: TaskId) -> bool {
            false
        }
        fn try_dequeue(&self) -> Option<TaskId> {
            None
        }
        fn is_empty(&self) -> bool {
            true
        }
        fn len(&self) -> usize {
            0
        }
        fn close(&self) {}
        fn is_closed(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn refused_enqueue_leaves_no_record_behind() {
        let scheduler = Scheduler::builder()
            .queue(Arc::new(RejectingQueue))
            .build()
            .unwrap();

        let err = scheduler.add_task(params("TPE-ICN")).unwrap_err();
        assert!(matches!(err, SchedulerError::Submission(_)));
        assert!(scheduler.tasks().is_empty());
        assert_eq!(scheduler.outstanding(), 0);
        assert!(scheduler.wait_for_all_tasks(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let scheduler = echo_scheduler(1);
        let unknown: TaskId = TaskId::from_ulid(ulid::Ulid::new());

        assert!(matches!(
            scheduler.get_task_status(unknown),
            Err(SchedulerError::NotFound(_))
        ));
        assert!(matches!(
            scheduler.handle_task_failure(unknown, TaskError::permanent("x")),
            Err(SchedulerError::NotFound(_))
        ));
        assert!(matches!(
            scheduler.retry_task(unknown),
            Err(SchedulerError::NotFound(_))
        ));
    }
}
