//! Flight task generation.
//!
//! A batch lists some flight tasks verbatim and describes others as
//! templates relative to the run date:
//!
//! - `[[fixed_month_tasks]]`: fixed days of a month N months ahead
//! - `[[holiday_tasks]]`: a travel window around each public holiday of a
//!   month N months ahead
//!
//! [`expand`] turns all of them into one list of [`FlightTaskConfig`].

mod fixed_month;
mod holidays;

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use chrono::{Datelike, Months, NaiveDate};
use faregate_core::TaskParameters;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::{BatchConfig, FlightTaskConfig, Holiday, RouteTemplate};

pub use fixed_month::fixed_month_trips;
pub use holidays::{holiday_trips, load_calendar, travel_window};

/// Static tasks first, then fixed-month trips, then holiday trips.
/// On a name collision the first task wins.
pub fn expand(cfg: &BatchConfig, holidays: &[Holiday], today: NaiveDate) -> Vec<FlightTaskConfig> {
    let fixed = fixed_month_trips(&cfg.fixed_month_tasks, today);
    let around_holidays = holiday_trips(&cfg.holiday_tasks, holidays, today, &fixed);

    let generated = fixed.iter().chain(&around_holidays).map(Trip::to_task);
    let mut seen = HashSet::new();
    let mut tasks = Vec::new();
    for task in cfg.flight_tasks.iter().cloned().chain(generated) {
        if seen.insert(task.name.clone()) {
            tasks.push(task);
        } else {
            debug!(name = %task.name, "duplicate flight task dropped");
        }
    }
    tasks
}

/// Inline `[[holidays]]` plus every `holiday_calendars` file, by date.
/// Relative calendar paths resolve against `base_dir`.
pub fn load_holidays(cfg: &BatchConfig, base_dir: &Path) -> Result<Vec<Holiday>> {
    let mut all = cfg.holidays.clone();
    for path in &cfg.holiday_calendars {
        all.extend(load_calendar(&base_dir.join(path))?);
    }
    all.sort_by_key(|h| h.date);
    Ok(all)
}

/// One round trip on concrete dates.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip<'a> {
    pub route: &'a RouteTemplate,
    pub params: &'a TaskParameters,
    pub depart: NaiveDate,
    pub ret: NaiveDate,
    /// Holiday description, if the trip was built around one.
    pub label: Option<&'a str>,
}

impl Trip<'_> {
    pub fn covers(&self, route: &RouteTemplate, day: NaiveDate) -> bool {
        self.route == route && self.depart <= day && day <= self.ret
    }

    pub fn name(&self) -> String {
        let dates = format!("{}/{}", self.depart, self.ret);
        match self.label {
            Some(label) => format!(
                "{}-{} {} {}",
                self.route.depart_city, self.route.arrive_city, label, dates
            ),
            None => format!(
                "{}-{} {}",
                self.route.depart_city, self.route.arrive_city, dates
            ),
        }
    }

    /// Template parameters plus `DepCity1`/`ArrCity1` and the two
    /// `SeekDestinations` legs.
    pub fn to_task(&self) -> FlightTaskConfig {
        let r = self.route;
        let mut api_params = self.params.clone();
        api_params.insert("DepCity1".into(), Value::from(r.depart_city.as_str()));
        api_params.insert("ArrCity1".into(), Value::from(r.arrive_city.as_str()));
        api_params.insert(
            "SeekDestinations".into(),
            json!([
                leg(self.depart, &r.depart_city, &r.depart_country, &r.arrive_city, &r.arrive_country),
                leg(self.ret, &r.arrive_city, &r.arrive_country, &r.depart_city, &r.depart_country),
            ]),
        );
        FlightTaskConfig {
            name: self.name(),
            api_params,
        }
    }
}

fn leg(date: NaiveDate, from: &str, from_country: &str, to: &str, to_country: &str) -> Value {
    json!({
        "DepartDate": date.to_string(),
        "DepartCity": from,
        "DepartAirport": "",
        "DepartCountry": from_country,
        "ArriveCity": to,
        "ArriveAirport": "",
        "ArriveCountry": to_country,
    })
}

/// First day of the month `offset` months after `today`'s month.
pub fn target_month(today: NaiveDate, offset: u32) -> Option<NaiveDate> {
    today.with_day(1)?.checked_add_months(Months::new(offset))
}

fn days_in_month(first: NaiveDate) -> Option<u32> {
    let next = first.checked_add_months(Months::new(1))?;
    u32::try_from((next - first).num_days()).ok()
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}
