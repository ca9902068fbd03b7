//! TaskHandler port - the acquisition callback.
//!
//! The scheduler treats the handler as opaque: fetch, parse and persist all
//! happen behind this one call.

use std::future::Future;

use async_trait::async_trait;

use crate::domain::{TaskError, TaskId, TaskParameters};

/// Executes one task.
///
/// `Ok` carries the result payload stored on the record; `Err` is recorded
/// as the task's `error_info`. Neither ever reaches the worker loop.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(
        &self,
        task_id: TaskId,
        parameters: &TaskParameters,
    ) -> Result<serde_json::Value, TaskError>;
}

/// Closure adapter returned by [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a [`TaskHandler`].
///
/// ```ignore
/// let handler = handler_fn(|task_id, params| async move {
///     Ok(serde_json::json!({ "task": task_id.to_string(), "params": params }))
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(TaskId, TaskParameters) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, TaskError>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(TaskId, TaskParameters) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, TaskError>> + Send,
{
    async fn handle(
        &self,
        task_id: TaskId,
        parameters: &TaskParameters,
    ) -> Result<serde_json::Value, TaskError> {
        (self.f)(task_id, parameters.clone()).await
    }
}
