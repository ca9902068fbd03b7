//! Task record: identity + lifecycle state of one acquisition task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::TaskError;
use super::ids::TaskId;
use super::status::TaskStatus;

/// Caller-supplied task parameters, passed verbatim to the handler.
pub type TaskParameters = serde_json::Map<String, serde_json::Value>;

/// One task in the registry.
///
/// Design:
/// - The registry is the single source of truth; the queue holds TaskId only.
/// - All status transitions go through the methods below, which refuse
///   transitions that would break the lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub parameters: TaskParameters,
    pub status: TaskStatus,

    /// Submission order within one scheduler.
    pub sequence: u64,

    /// 1 for a fresh submission, n + 1 for a retry of attempt n.
    pub attempt: u32,

    /// The failed record this one retries.
    pub retry_of: Option<TaskId>,

    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    pub result: Option<serde_json::Value>,
    pub error_info: Option<TaskError>,
}

impl TaskRecord {
    pub fn new(
        task_id: TaskId,
        parameters: TaskParameters,
        sequence: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            parameters,
            status: TaskStatus::Pending,
            sequence,
            attempt: 1,
            retry_of: None,
            created_at: now,
            start_time: None,
            end_time: None,
            result: None,
            error_info: None,
        }
    }

    /// A fresh pending record that retries `failed`.
    pub fn retry_of(
        failed: &TaskRecord,
        task_id: TaskId,
        sequence: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let mut record = Self::new(task_id, failed.parameters.clone(), sequence, now);
        record.attempt = failed.attempt + 1;
        record.retry_of = Some(failed.task_id);
        record
    }

    /// Pending -> Running. Returns false (and changes nothing) otherwise.
    pub fn mark_running(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Running;
        self.start_time = Some(now);
        true
    }

    /// Running -> Succeeded.
    pub fn mark_succeeded(&mut self, result: serde_json::Value, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }
        self.status = TaskStatus::Succeeded;
        self.result = Some(result);
        self.stamp_end(now);
        true
    }

    /// Pending | Running -> Failed.
    pub fn mark_failed(&mut self, error: TaskError, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.error_info = Some(error);
        self.stamp_end(now);
        true
    }

    /// Wall time spent running, once both timestamps are known.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        Some(self.end_time? - self.start_time?)
    }

    // wall clock は巻き戻ることがあるので end >= start を保証する
    fn stamp_end(&mut self, now: DateTime<Utc>) {
        let end = match self.start_time {
            Some(start) if now < start => start,
            _ => now,
        };
        self.end_time = Some(end);
    }
}
