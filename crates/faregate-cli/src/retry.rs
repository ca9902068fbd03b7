//! Retry policy: which failed tasks get another attempt, and when.

use std::time::Duration;

use faregate_core::{ErrorKind, TaskRecord, TaskStatus};

use crate::config::RetrySection;

/// Retry policy for failed flight tasks.
///
/// Retries happen in rounds: after the scheduler drains, every retryable
/// failure is resubmitted together once the round's delay has passed.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per flight task, the first one included.
    pub max_attempts: u32,

    /// Delay before the first retry round.
    pub base_delay: Duration,

    /// Backoff multiplier for later rounds.
    pub multiplier: f64,

    pub retry_on: Vec<ErrorKind>,
}

impl RetryPolicy {
    pub fn from_config(section: &RetrySection) -> Self {
        Self {
            max_attempts: section.max_attempts,
            base_delay: Duration::from_secs(section.interval_secs),
            multiplier: section.backoff_factor,
            retry_on: section.retry_on.clone(),
        }
    }

    /// Delay before retry round `round` (1-indexed):
    /// `base_delay * multiplier^(round - 1)`.
    ///
    /// With base_delay=5s, multiplier=2.0: 5s, 10s, 20s, ...
    pub fn next_delay(&self, round: u32) -> Duration {
        let exponent = i32::try_from(round.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Whether `record` failed in a way worth another attempt.
    pub fn should_retry(&self, record: &TaskRecord) -> bool {
        if record.status != TaskStatus::Failed || record.attempt >= self.max_attempts {
            return false;
        }
        record
            .error_info
            .as_ref()
            .is_some_and(|err| self.retry_on.contains(&err.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use faregate_core::domain::TaskParameters;
    use faregate_core::{TaskError, TaskId};
    use rstest::rstest;

    fn policy() -> RetryPolicy {
        RetryPolicy::from_config(&RetrySection::default())
    }

    fn failed(attempt: u32, error: TaskError) -> TaskRecord {
        let now = Utc::now();
        let mut record = TaskRecord::new(
            "01ARZ3NDEKTSV4RRFFQ69G5FAV".parse::<TaskId>().unwrap(),
            TaskParameters::new(),
            0,
            now,
        );
        record.attempt = attempt;
        record.mark_failed(error, now);
        record
    }

    #[test]
    fn exponential_backoff_increases() {
        let policy = policy();

        assert_eq!(policy.next_delay(1), Duration::from_secs(5));
        assert_eq!(policy.next_delay(2), Duration::from_secs(10));
        assert_eq!(policy.next_delay(3), Duration::from_secs(20));
    }

    #[test]
    fn huge_rounds_saturate() {
        assert_eq!(policy().next_delay(u32::MAX), Duration::MAX);
    }

    #[rstest]
    #[case(1, TaskError::transient("429 from vendor"), true)]
    #[case(2, TaskError::infrastructure("warehouse down"), true)]
    #[case(3, TaskError::transient("429 from vendor"), false)]
    #[case(1, TaskError::permanent("bad airport code"), false)]
    #[case(1, TaskError::new(ErrorKind::Panicked, "boom"), false)]
    fn retries_only_listed_kinds_under_the_cap(
        #[case] attempt: u32,
        #[case] error: TaskError,
        #[case] expected: bool,
    ) {
        assert_eq!(policy().should_retry(&failed(attempt, error)), expected);
    }

    #[test]
    fn succeeded_tasks_are_not_retried() {
        let now = Utc::now();
        let mut record = failed(1, TaskError::transient("x"));
        record.status = TaskStatus::Succeeded;
        record.error_info = None;
        record.end_time = Some(now);
        assert!(!policy().should_retry(&record));
    }
}
