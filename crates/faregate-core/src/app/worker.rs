//! WorkerGroup - dequeue → acquire → handle → record のループ
//!
//! # フロー
//! 1. Queue::dequeue() で task_id 取得（空なら待つ）
//! 2. AdmissionGate::acquire() で permit 取得（満杯なら待つ）
//! 3. record を Running に遷移（pending でなければ捨てる）
//! 4. handler を別 task で実行（panic を worker に波及させない）
//! 5. Succeeded / Failed を記録
//! 6. permit を drop してから barrier を減らす

use std::any::Any;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::app::scheduler::SchedulerCore;
use crate::domain::{TaskError, TaskId};
use crate::ports::TaskHandler;

/// Worker group handle.
/// - `request_shutdown()` で新規タスクの取得を止める
/// - `shutdown_and_join()` で全ワーカーの終了を待つ
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers. Must be called from within a tokio runtime.
    pub(crate) fn spawn(n: usize, core: Arc<SchedulerCore>, handler: Arc<dyn TaskHandler>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let joins = (0..n)
            .map(|worker_id| {
                let core = Arc::clone(&core);
                let handler = Arc::clone(&handler);
                let mut rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, core, handler, &mut rx).await;
                })
            })
            .collect();

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Stop taking new tasks. In-flight handlers run to completion.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                error!(error = %e, "worker terminated abnormally");
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    core: Arc<SchedulerCore>,
    handler: Arc<dyn TaskHandler>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    debug!(worker = worker_id, "worker started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // dequeue は待つ可能性があるので shutdown と競合させる
        let task_id = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    // sender dropped: the group handle is gone
                    break;
                }
                continue;
            }
            next = core.queue.dequeue() => match next {
                Some(task_id) => task_id,
                None => break,
            },
        };

        // shutdown closes the gate; a task popped but never admitted stays pending
        let permit = match core.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                debug!(
                    worker = worker_id,
                    %task_id,
                    error = %e,
                    "admission closed, task left pending"
                );
                break;
            }
        };

        let finished = run_task(worker_id, &core, &handler, task_id).await;
        // permit first, then the barrier: a completed wait never sees a held permit
        drop(permit);
        if finished {
            core.release();
        }
    }
    debug!(worker = worker_id, "worker stopped");
}

/// Returns whether the task reached a terminal status here.
async fn run_task(
    worker_id: usize,
    core: &SchedulerCore,
    handler: &Arc<dyn TaskHandler>,
    task_id: TaskId,
) -> bool {
    let Some((parameters, attempt)) = core.begin(task_id) else {
        // abandoned via handle_task_failure while it sat in the queue
        debug!(worker = worker_id, %task_id, "skipping task that is no longer pending");
        return false;
    };
    info!(worker = worker_id, %task_id, attempt, "task started");

    let handle = tokio::spawn({
        let handler = Arc::clone(handler);
        async move { handler.handle(task_id, &parameters).await }
    });

    let outcome = match handle.await {
        Ok(outcome) => outcome,
        Err(join_err) => Err(join_error_to_task_error(join_err)),
    };

    match &outcome {
        Ok(_) => info!(worker = worker_id, %task_id, "task succeeded"),
        Err(e) => warn!(worker = worker_id, %task_id, kind = %e.kind, error = %e.message, "task failed"),
    }
    core.record_outcome(task_id, outcome)
}

fn join_error_to_task_error(err: JoinError) -> TaskError {
    if err.is_panic() {
        TaskError::panicked(panic_message(err.into_panic()))
    } else {
        TaskError::infrastructure(format!("handler task cancelled: {err}"))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn static_panic() {
        panic!("selector not found")
    }

    async fn formatted_panic(code: u16) {
        panic!("vendor returned {code}")
    }

    #[tokio::test]
    async fn panic_payload_becomes_task_error() {
        let join_err = tokio::spawn(static_panic()).await.unwrap_err();

        let err = join_error_to_task_error(join_err);
        assert_eq!(err, TaskError::panicked("selector not found"));
    }

    #[tokio::test]
    async fn formatted_panic_payload_is_kept() {
        let join_err = tokio::spawn(formatted_panic(502)).await.unwrap_err();

        let err = join_error_to_task_error(join_err);
        assert_eq!(err.message, "vendor returned 502");
    }
}
