//! Queue port - pending task id の FIFO バッファ
//!
//! The queue carries TaskId only; parameters and status live in the registry.

use async_trait::async_trait;

use crate::domain::TaskId;

/// Queue port (interface).
///
/// Implementations must tolerate concurrent `enqueue` from submitters and
/// concurrent `dequeue` from every worker without losing or duplicating an id.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Append to the tail. Returns false if the queue is closed.
    fn enqueue(&self, task_id: TaskId) -> bool;

    /// Wait for the head item. Returns `None` once the queue is closed.
    async fn dequeue(&self) -> Option<TaskId>;

    /// Take `task_id` out wherever it sits. Returns whether it was queued.
    fn remove(&self, task_id: TaskId) -> bool;

    /// Non-blocking pop.
    fn try_dequeue(&self) -> Option<TaskId>;

    /// Coarse emptiness check; not a synchronization primitive.
    fn is_empty(&self) -> bool;

    fn len(&self) -> usize;

    /// Stop handing out items and wake every waiting `dequeue`.
    fn close(&self);

    fn is_closed(&self) -> bool;
}
