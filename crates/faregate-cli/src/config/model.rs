use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use faregate_core::{ErrorKind, SchedulerConfig, TaskParameters};
use serde::Deserialize;

/// Top-level batch file.
///
/// ```toml
/// [task]
/// max_concurrent_tasks = 4
/// task_timeout_minutes = 120
///
/// [retry]
/// max_attempts = 3
/// interval_secs = 5
/// backoff_factor = 2.0
/// retry_on = ["transient", "infrastructure"]
///
/// [acquisition]
/// command = "./fetch-fares.sh"
///
/// [[flight_tasks]]
/// name = "tpe-nrt-weekend"
/// api_params = { from = "TPE", to = "NRT", depart = "2025-03-01" }
///
/// [[fixed_month_tasks]]
/// route = { depart_city = "TPE", depart_country = "TW", arrive_city = "SIN", arrive_country = "SG" }
/// month_offset = 2
/// depart_day = 5
/// return_day = 10
///
/// [[holiday_tasks]]
/// route = { depart_city = "TPE", depart_country = "TW", arrive_city = "NRT", arrive_country = "JP" }
/// month_offset = 3
///
/// [[holidays]]
/// date = "2025-10-10"
/// description = "國慶日"
/// ```
///
/// Every section is optional. Templates are expanded into flight tasks
/// against the run date, see `crate::tasks`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    #[serde(default)]
    pub task: TaskSection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub acquisition: AcquisitionSection,

    /// TaiwanCalendar-style JSON files, relative to the batch file.
    #[serde(default)]
    pub holiday_calendars: Vec<PathBuf>,

    #[serde(default)]
    pub flight_tasks: Vec<FlightTaskConfig>,

    #[serde(default)]
    pub fixed_month_tasks: Vec<FixedMonthTaskConfig>,

    #[serde(default)]
    pub holiday_tasks: Vec<HolidayTaskConfig>,

    /// Holidays listed inline, merged with `holiday_calendars`.
    #[serde(default)]
    pub holidays: Vec<Holiday>,
}

/// `[task]` section: concurrency and the batch deadline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskSection {
    pub max_concurrent_tasks: usize,

    /// Deadline for the whole batch, retries included.
    pub task_timeout_minutes: u64,
}

impl TaskSection {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::with_max_concurrent_tasks(self.max_concurrent_tasks)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_minutes.saturating_mul(60))
    }
}

impl Default for TaskSection {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            task_timeout_minutes: 120,
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    /// Total attempts per flight task, the first one included.
    pub max_attempts: u32,

    /// Delay before the first retry round.
    pub interval_secs: u64,

    pub backoff_factor: f64,

    /// Failure kinds worth another attempt.
    pub retry_on: Vec<ErrorKind>,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval_secs: 5,
            backoff_factor: 2.0,
            retry_on: vec![ErrorKind::Transient, ErrorKind::Infrastructure],
        }
    }
}

/// `[acquisition]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcquisitionSection {
    /// Shell command run once per task attempt.
    pub command: Option<String>,
}

/// One `[[flight_tasks]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlightTaskConfig {
    pub name: String,

    /// Passed to the acquisition command untouched.
    #[serde(default)]
    pub api_params: TaskParameters,
}

/// Both ends of a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteTemplate {
    pub depart_city: String,
    #[serde(default)]
    pub depart_country: String,
    pub arrive_city: String,
    #[serde(default)]
    pub arrive_country: String,
}

/// `[[fixed_month_tasks]]`: one round trip on fixed days of the month
/// `month_offset` months after the run date.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixedMonthTaskConfig {
    pub route: RouteTemplate,
    pub month_offset: u32,
    /// Clamped to the last day of a shorter month.
    pub depart_day: u32,
    pub return_day: u32,
    #[serde(default)]
    pub api_params: TaskParameters,
}

/// `[[holiday_tasks]]`: one round trip around every holiday of the month
/// `month_offset` months after the run date.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HolidayTaskConfig {
    pub route: RouteTemplate,
    pub month_offset: u32,
    /// Holidays whose description contains one of these are skipped.
    #[serde(default = "default_skip_keywords")]
    pub skip_keywords: Vec<String>,
    #[serde(default)]
    pub api_params: TaskParameters,
}

fn default_skip_keywords() -> Vec<String> {
    vec!["春節".to_string(), "農曆除夕".to_string()]
}

/// One public holiday.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Holiday {
    pub date: NaiveDate,
    pub description: String,
}
