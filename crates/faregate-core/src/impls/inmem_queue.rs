//! InMemoryQueue - プロセス内 FIFO キュー
//!
//! # 実装詳細
//! - `std::sync::Mutex<VecDeque<TaskId>>` で排他制御（ロック中に await しない）
//! - `tokio::sync::Notify` で dequeue 待ちを起こす

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::domain::TaskId;
use crate::ports::Queue;

#[derive(Default)]
struct QueueState {
    items: VecDeque<TaskId>,
    closed: bool,
}

/// In-memory FIFO of pending task ids.
#[derive(Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // 中身は VecDeque と bool だけなので poison されても整合性は崩れない
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    fn enqueue(&self, task_id: TaskId) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.items.push_back(task_id);
        }
        // Notify outside the lock
        self.notify.notify_one();
        true
    }

    async fn dequeue(&self) -> Option<TaskId> {
        loop {
            // enable() してから状態を見ることで、確認と待機の間の notify を取りこぼさない
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(task_id) = state.items.pop_front() {
                    let more = !state.items.is_empty();
                    drop(state);
                    // Hand the wake-up on if we consumed one meant for several items.
                    if more {
                        self.notify.notify_one();
                    }
                    return Some(task_id);
                }
            }

            notified.await;
        }
    }

    fn remove(&self, task_id: TaskId) -> bool {
        let mut state = self.lock();
        match state.items.iter().position(|queued| *queued == task_id) {
            Some(index) => state.items.remove(index).is_some(),
            None => false,
        }
    }

    fn try_dequeue(&self) -> Option<TaskId> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        state.items.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    fn len(&self) -> usize {
        self.lock().items.len()
    }

    fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
