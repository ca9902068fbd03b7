use thiserror::Error;

use crate::domain::{TaskId, TaskStatus};

/// Errors surfaced synchronously to the caller of a scheduler operation.
///
/// Handler failures are not here: they are `TaskError`s stored on the task
/// record and never returned from a scheduler method.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("max_concurrent_tasks must be at least 1 (got {0})")]
    CapacityConfiguration(usize),

    #[error("worker_count must be at least 1 (got {0})")]
    WorkerConfiguration(usize),

    #[error("submission rejected: {0}")]
    Submission(String),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("no task handler registered")]
    MissingHandler,

    #[error("a task handler is already registered")]
    HandlerAlreadySet,

    #[error("scheduler already started")]
    AlreadyStarted,

    #[error("task {0} is running and owned by a worker")]
    TaskInFlight(TaskId),

    #[error("task {task_id} cannot go from {from} to {to}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("admission gate closed")]
    GateClosed,
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
