//! TaskRegistry - task id -> TaskRecord の共有マップ
//!
//! Map-level access (insert / lookup) goes through one mutex. Only the
//! worker that owns a task id mutates that record, so the lock is held just
//! for the map operation and the copy-out, never across an await.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::app::status::StatusCounts;
use crate::domain::{TaskId, TaskRecord};
use crate::error::{Result, SchedulerError};

#[derive(Default)]
struct RegistryState {
    records: HashMap<TaskId, TaskRecord>,
    next_sequence: u64,
}

/// Owns every record for the scheduler's lifetime. Only a submission that
/// failed before its id was returned is ever removed.
#[derive(Default)]
pub struct TaskRegistry {
    state: Mutex<RegistryState>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a record built from the next submission sequence number.
    ///
    /// Fails with `Submission` if the id is already taken; the sequence
    /// number is not consumed in that case.
    pub fn insert_with(
        &self,
        task_id: TaskId,
        build: impl FnOnce(u64) -> TaskRecord,
    ) -> Result<TaskId> {
        let mut state = self.lock();
        if state.records.contains_key(&task_id) {
            return Err(SchedulerError::Submission(format!(
                "task id collision: {task_id}"
            )));
        }
        let sequence = state.next_sequence + 1;
        let record = build(sequence);
        state.next_sequence = sequence;
        state.records.insert(task_id, record);
        Ok(task_id)
    }

    /// Point-in-time copy of one record.
    pub fn get(&self, task_id: TaskId) -> Result<TaskRecord> {
        self.lock()
            .records
            .get(&task_id)
            .cloned()
            .ok_or_else(|| SchedulerError::NotFound(task_id.to_string()))
    }

    /// Mutate one record in place.
    pub fn update<R>(&self, task_id: TaskId, f: impl FnOnce(&mut TaskRecord) -> R) -> Result<R> {
        let mut state = self.lock();
        let record = state
            .records
            .get_mut(&task_id)
            .ok_or_else(|| SchedulerError::NotFound(task_id.to_string()))?;
        Ok(f(record))
    }

    /// Drop a record that was never handed back to a caller.
    pub fn remove(&self, task_id: TaskId) -> Option<TaskRecord> {
        self.lock().records.remove(&task_id)
    }

    /// Copies of every record, in submission order.
    pub fn snapshots(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self.lock().records.values().cloned().collect();
        records.sort_by_key(|r| r.sequence);
        records
    }

    pub fn counts(&self) -> StatusCounts {
        self.lock().records.values().map(|r| r.status).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
