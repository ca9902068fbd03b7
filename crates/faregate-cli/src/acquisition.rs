//! Acquisition handlers: the work each flight task actually does.
//!
//! - `CommandHandler`: 外部コマンドを 1 タスク 1 プロセスで実行
//! - `DryRunHandler`: `--dry-run` 用、パラメータをそのまま返す

use std::process::Stdio;

use async_trait::async_trait;
use faregate_core::typed::Handler;
use faregate_core::{TaskError, TaskId, TaskParameters};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::{debug, info};

/// Exit code (`EX_TEMPFAIL`) a command uses to report a transient failure.
pub const EXIT_TRANSIENT: i32 = 75;

/// Typed parameters of one flight task, as submitted to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightQuery {
    pub name: String,
    #[serde(default)]
    pub api_params: TaskParameters,
}

/// Runs the configured shell command once per task attempt.
///
/// The command sees `FAREGATE_TASK_ID`, `FAREGATE_TASK_NAME` and
/// `FAREGATE_PARAMS` (the task's `api_params` as JSON). Its stdout becomes
/// the task result: parsed as JSON when it is JSON, kept as a string
/// otherwise.
///
/// | exit           | outcome                  |
/// |----------------|--------------------------|
/// | 0              | success                  |
/// | 75             | `Transient` failure      |
/// | other          | `Permanent` failure      |
/// | spawn / signal | `Infrastructure` failure |
#[derive(Debug, Clone)]
pub struct CommandHandler {
    command: String,
}

impl CommandHandler {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn build_command(&self, task_id: TaskId, task: &FlightQuery) -> Result<Command, TaskError> {
        let params = serde_json::to_string(&task.api_params)
            .map_err(|e| TaskError::permanent(format!("encoding api_params: {e}")))?;

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.command);
            c
        };

        cmd.env("FAREGATE_TASK_ID", task_id.to_string())
            .env("FAREGATE_TASK_NAME", &task.name)
            .env("FAREGATE_PARAMS", params)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }
}

#[async_trait]
impl Handler<FlightQuery> for CommandHandler {
    type Output = Value;

    async fn handle(&self, task_id: TaskId, task: FlightQuery) -> Result<Value, TaskError> {
        info!(%task_id, task = %task.name, cmd = %self.command, "starting acquisition process");

        let output = self
            .build_command(task_id, &task)?
            .output()
            .await
            .map_err(|e| {
                TaskError::infrastructure(format!(
                    "spawning acquisition command for '{}': {e}",
                    task.name
                ))
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!(%task_id, task = %task.name, "stderr: {}", line);
        }

        match output.status.code() {
            Some(0) => Ok(parse_stdout(&output.stdout)),
            Some(code) => {
                let detail = last_line(&stderr)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("exit code {code}"));
                if code == EXIT_TRANSIENT {
                    Err(TaskError::transient(detail))
                } else {
                    Err(TaskError::permanent(format!("exit code {code}: {detail}")))
                }
            }
            None => Err(TaskError::infrastructure(format!(
                "acquisition process for '{}' terminated by signal",
                task.name
            ))),
        }
    }
}

fn parse_stdout(stdout: &[u8]) -> Value {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rfind(|l| !l.is_empty())
}

/// Echoes each task's parameters back as its result.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunHandler;

#[async_trait]
impl Handler<FlightQuery> for DryRunHandler {
    type Output = Value;

    async fn handle(&self, task_id: TaskId, task: FlightQuery) -> Result<Value, TaskError> {
        debug!(%task_id, task = %task.name, "dry run");
        Ok(json!({
            "dry_run": true,
            "name": task.name,
            "api_params": task.api_params,
        }))
    }
}
