//! Scheduler configuration.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 4;

/// Concurrency settings.
///
/// Deserializable so callers can embed it in their own config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Ceiling on concurrently running tasks.
    pub max_concurrent_tasks: usize,

    /// Worker loops to launch. Defaults to `max_concurrent_tasks`; more
    /// workers than permits only adds idle loops parked on the gate.
    pub worker_count: Option<usize>,
}

impl SchedulerConfig {
    pub fn with_max_concurrent_tasks(max_concurrent_tasks: usize) -> Self {
        Self {
            max_concurrent_tasks,
            worker_count: None,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count.unwrap_or(self.max_concurrent_tasks)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::with_max_concurrent_tasks(DEFAULT_MAX_CONCURRENT_TASKS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_four_workers() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.max_concurrent_tasks, 4);
        assert_eq!(cfg.worker_count(), 4);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: SchedulerConfig = serde_json::from_str(r#"{"worker_count": 8}"#).unwrap();
        assert_eq!(cfg.max_concurrent_tasks, 4);
        assert_eq!(cfg.worker_count(), 8);
    }
}
