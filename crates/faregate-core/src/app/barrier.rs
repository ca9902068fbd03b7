//! CompletionBarrier - 未完了タスク数が 0 になるのを待つ
//!
//! The outstanding count covers pending + running records. It goes up in
//! `add_task` before the id is visible in the queue and goes down exactly
//! once per record, when that record becomes terminal.

use std::time::Duration;

use tokio::sync::watch;

pub struct CompletionBarrier {
    outstanding: watch::Sender<usize>,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        let (outstanding, _rx) = watch::channel(0);
        Self { outstanding }
    }

    pub fn increment(&self) {
        self.outstanding.send_modify(|n| *n += 1);
    }

    pub fn decrement(&self) {
        self.outstanding.send_modify(|n| {
            debug_assert!(*n > 0, "outstanding count underflow");
            *n = n.saturating_sub(1);
        });
    }

    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Wait until the live count reads zero, or `timeout` elapses.
    ///
    /// Work submitted while waiting extends the wait. Returns whether zero was
    /// observed in time; nothing is cancelled either way.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.outstanding.subscribe();
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|n| *n == 0)).await,
            Ok(Ok(_))
        )
    }
}

impl Default for CompletionBarrier {
    fn default() -> Self {
        Self::new()
    }
}
