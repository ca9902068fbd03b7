//! BatchController - 1 バッチの実行（投入 → 待機 → リトライ → レポート）

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use faregate_core::domain::{Id, IdMarker};
use faregate_core::ports::{SystemClock, UlidGenerator};
use faregate_core::{Scheduler, TaskError, TaskHandler, TaskId, TaskRecord, TaskStatus};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::acquisition::FlightQuery;
use crate::config::BatchConfig;
use crate::retry::RetryPolicy;

/// Batch のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Batch {}

impl IdMarker for Batch {
    fn prefix() -> &'static str {
        "batch-"
    }
}

pub type BatchId = Id<Batch>;

/// Outcome of one batch run, printed as JSON on stdout.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_secs: f64,
    pub timed_out: bool,
    pub retry_rounds: u32,
    pub tasks: Vec<TaskReport>,
}

/// Final state of one flight task, after its last attempt.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub name: String,
    pub task_id: String,
    pub status: TaskStatus,
    pub attempts: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<TaskError>,
}

impl TaskReport {
    fn new(name: &str, record: &TaskRecord) -> Self {
        Self {
            name: name.to_string(),
            task_id: record.task_id.to_string(),
            status: record.status,
            attempts: record.attempt,
            start_time: record.start_time,
            end_time: record.end_time,
            result: record.result.clone(),
            error: record.error_info.clone(),
        }
    }
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.failed == 0 && self.completed_tasks == self.total_tasks
    }
}

/// Latest attempt of a named flight task.
struct Lineage {
    name: String,
    task_id: TaskId,
}

/// Drives one batch through a scheduler.
pub struct BatchController {
    config: BatchConfig,
    handler: Arc<dyn TaskHandler>,
    policy: RetryPolicy,
}

impl BatchController {
    pub fn new(config: BatchConfig, handler: Arc<dyn TaskHandler>) -> Self {
        let policy = RetryPolicy::from_config(&config.retry);
        Self {
            config,
            handler,
            policy,
        }
    }

    /// Submit every flight task, wait for them (retrying what the policy
    /// allows) and report. The scheduler is shut down before returning.
    pub async fn run(&self) -> Result<BatchReport> {
        let batch_id: BatchId = UlidGenerator::new(SystemClock).generate();
        let started_at = Utc::now();
        let started = Instant::now();
        let deadline = started + self.config.task.timeout();

        let scheduler = Scheduler::builder()
            .config(self.config.task.scheduler_config())
            .shared_handler(Arc::clone(&self.handler))
            .build()
            .context("building scheduler")?;

        info!(
            %batch_id,
            tasks = self.config.flight_tasks.len(),
            max_concurrent_tasks = scheduler.max_concurrent_tasks(),
            timeout_minutes = self.config.task.task_timeout_minutes,
            "batch started"
        );

        let outcome = self.drive(&scheduler, deadline).await;
        // stop the workers even when driving failed part-way
        scheduler.shutdown().await;
        let (lineages, timed_out, retry_rounds) = outcome?;

        let tasks = lineages
            .iter()
            .map(|l| {
                scheduler
                    .get_task_status(l.task_id)
                    .map(|record| TaskReport::new(&l.name, &record))
                    .with_context(|| format!("reading status of '{}'", l.name))
            })
            .collect::<Result<Vec<_>>>()?;

        let report = build_report(
            batch_id,
            started_at,
            started.elapsed(),
            timed_out,
            retry_rounds,
            tasks,
        );
        if report.is_success() {
            info!(%batch_id, succeeded = report.succeeded, "batch finished");
        } else {
            warn!(
                %batch_id,
                succeeded = report.succeeded,
                failed = report.failed,
                timed_out = report.timed_out,
                "batch finished with failures"
            );
        }
        Ok(report)
    }

    async fn drive(
        &self,
        scheduler: &Scheduler,
        deadline: Instant,
    ) -> Result<(Vec<Lineage>, bool, u32)> {
        let mut lineages = Vec::with_capacity(self.config.flight_tasks.len());
        for task in &self.config.flight_tasks {
            let query = FlightQuery {
                name: task.name.clone(),
                api_params: task.api_params.clone(),
            };
            let task_id = scheduler
                .add_typed_task(&query)
                .with_context(|| format!("submitting flight task '{}'", task.name))?;
            lineages.push(Lineage {
                name: task.name.clone(),
                task_id,
            });
        }

        scheduler
            .start(scheduler.config().worker_count())
            .context("starting workers")?;

        let mut timed_out = !wait_until(scheduler, deadline).await;
        let mut round = 0;

        while !timed_out {
            let retryable: Vec<usize> = lineages
                .iter()
                .enumerate()
                .filter(|(_, l)| {
                    scheduler
                        .get_task_status(l.task_id)
                        .is_ok_and(|record| self.policy.should_retry(&record))
                })
                .map(|(i, _)| i)
                .collect();
            if retryable.is_empty() {
                break;
            }

            let next_round = round + 1;
            let delay = self.policy.next_delay(next_round);
            if Instant::now() + delay >= deadline {
                warn!(
                    round = next_round,
                    tasks = retryable.len(),
                    ?delay,
                    "no time left for another retry round"
                );
                break;
            }
            round = next_round;
            info!(round, tasks = retryable.len(), ?delay, "retry round scheduled");
            tokio::time::sleep(delay).await;

            for i in retryable {
                let lineage = &mut lineages[i];
                lineage.task_id = scheduler
                    .retry_task(lineage.task_id)
                    .with_context(|| format!("resubmitting flight task '{}'", lineage.name))?;
            }
            timed_out = !wait_until(scheduler, deadline).await;
        }

        Ok((lineages, timed_out, round))
    }
}

async fn wait_until(scheduler: &Scheduler, deadline: Instant) -> bool {
    let remaining = deadline.saturating_duration_since(Instant::now());
    scheduler.wait_for_all_tasks(remaining).await
}

fn build_report(
    batch_id: BatchId,
    started_at: DateTime<Utc>,
    elapsed: Duration,
    timed_out: bool,
    retry_rounds: u32,
    tasks: Vec<TaskReport>,
) -> BatchReport {
    let succeeded = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Succeeded)
        .count();
    let failed = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Failed)
        .count();

    BatchReport {
        batch_id: batch_id.to_string(),
        started_at,
        finished_at: Utc::now(),
        total_tasks: tasks.len(),
        completed_tasks: succeeded + failed,
        succeeded,
        failed,
        elapsed_secs: elapsed.as_secs_f64(),
        timed_out,
        retry_rounds,
        tasks,
    }
}
