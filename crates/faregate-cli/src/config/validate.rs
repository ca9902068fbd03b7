use std::collections::HashSet;

use anyhow::{Result, anyhow};

use crate::config::model::{BatchConfig, RouteTemplate};

/// Semantic checks on a loaded batch file:
/// - `[task].max_concurrent_tasks >= 1`
/// - `[task].task_timeout_minutes >= 1`
/// - `[retry].max_attempts >= 1`
/// - `[retry].backoff_factor >= 1.0`
/// - flight task names are non-empty and unique
/// - template routes name both cities
/// - fixed-month days are within 1..=31 and depart on or before return
///
/// The acquisition command is checked separately by [`require_command`],
/// since `--dry-run` does without it.
pub fn validate_config(cfg: &BatchConfig) -> Result<()> {
    validate_task_section(cfg)?;
    validate_retry_section(cfg)?;
    validate_flight_tasks(cfg)?;
    validate_templates(cfg)?;
    Ok(())
}

/// The acquisition command, or an error if there is none.
pub fn require_command(cfg: &BatchConfig) -> Result<&str> {
    match cfg.acquisition.command.as_deref().map(str::trim) {
        Some(cmd) if !cmd.is_empty() => Ok(cmd),
        _ => Err(anyhow!(
            "[acquisition].command is required unless --dry-run is given"
        )),
    }
}

fn validate_task_section(cfg: &BatchConfig) -> Result<()> {
    if cfg.task.max_concurrent_tasks == 0 {
        return Err(anyhow!("[task].max_concurrent_tasks must be >= 1 (got 0)"));
    }
    if cfg.task.task_timeout_minutes == 0 {
        return Err(anyhow!("[task].task_timeout_minutes must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_retry_section(cfg: &BatchConfig) -> Result<()> {
    if cfg.retry.max_attempts == 0 {
        return Err(anyhow!("[retry].max_attempts must be >= 1 (got 0)"));
    }
    let backoff = cfg.retry.backoff_factor;
    // NaN fails both checks
    if !(backoff.is_finite() && backoff >= 1.0) {
        return Err(anyhow!(
            "[retry].backoff_factor must be a finite number >= 1.0 (got {backoff})"
        ));
    }
    Ok(())
}

fn validate_flight_tasks(cfg: &BatchConfig) -> Result<()> {
    let mut seen = HashSet::new();
    for task in &cfg.flight_tasks {
        if task.name.trim().is_empty() {
            return Err(anyhow!("flight task names must not be empty"));
        }
        if !seen.insert(task.name.as_str()) {
            return Err(anyhow!("duplicate flight task name '{}'", task.name));
        }
    }
    Ok(())
}

fn validate_templates(cfg: &BatchConfig) -> Result<()> {
    for (i, t) in cfg.fixed_month_tasks.iter().enumerate() {
        validate_route(&t.route, "fixed_month_tasks", i)?;
        for (key, day) in [("depart_day", t.depart_day), ("return_day", t.return_day)] {
            if !(1..=31).contains(&day) {
                return Err(anyhow!(
                    "fixed_month_tasks[{i}].{key} must be within 1..=31 (got {day})"
                ));
            }
        }
        if t.depart_day > t.return_day {
            return Err(anyhow!(
                "fixed_month_tasks[{i}]: depart_day {} is after return_day {}",
                t.depart_day,
                t.return_day
            ));
        }
    }
    for (i, t) in cfg.holiday_tasks.iter().enumerate() {
        validate_route(&t.route, "holiday_tasks", i)?;
    }
    Ok(())
}

fn validate_route(route: &RouteTemplate, table: &str, index: usize) -> Result<()> {
    if route.depart_city.trim().is_empty() || route.arrive_city.trim().is_empty() {
        return Err(anyhow!(
            "{table}[{index}].route needs both depart_city and arrive_city"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> BatchConfig {
        toml::from_str(toml_src).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&BatchConfig::default()).is_ok());
    }

    #[test]
    fn blank_command_is_missing() {
        let cfg = parse(
            r#"
            [acquisition]
            command = "   "
            "#,
        );
        assert!(require_command(&cfg).is_err());
    }

    #[test]
    fn command_is_trimmed() {
        let cfg = parse(
            r#"
            [acquisition]
            command = " ./fetch.sh "
            "#,
        );
        assert_eq!(require_command(&cfg).unwrap(), "./fetch.sh");
    }

    #[test]
    fn nan_backoff_is_rejected() {
        let mut cfg = BatchConfig::default();
        cfg.retry.backoff_factor = f64::NAN;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn fixed_month_days_are_checked() {
        let cfg = parse(
            r#"
            [[fixed_month_tasks]]
            route = { depart_city = "TPE", arrive_city = "SIN" }
            month_offset = 2
            depart_day = 0
            return_day = 10
            "#,
        );
        let err = validate_config(&cfg).unwrap_err().to_string();
        assert!(err.contains("depart_day must be within 1..=31"), "{err}");

        let cfg = parse(
            r#"
            [[fixed_month_tasks]]
            route = { depart_city = "TPE", arrive_city = "SIN" }
            month_offset = 2
            depart_day = 12
            return_day = 10
            "#,
        );
        let err = validate_config(&cfg).unwrap_err().to_string();
        assert!(err.contains("is after return_day"), "{err}");
    }

    #[test]
    fn holiday_route_needs_both_cities() {
        let cfg = parse(
            r#"
            [[holiday_tasks]]
            route = { depart_city = "TPE", arrive_city = " " }
            month_offset = 3
            "#,
        );
        let err = validate_config(&cfg).unwrap_err().to_string();
        assert!(err.contains("holiday_tasks[0].route"), "{err}");
    }
}
