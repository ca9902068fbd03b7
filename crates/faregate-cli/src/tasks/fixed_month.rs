use chrono::{Datelike, NaiveDate};
use tracing::warn;

use super::{Trip, days_in_month, target_month};
use crate::config::FixedMonthTaskConfig;

/// One trip per template, on `depart_day`/`return_day` of the target
/// month. Days past the end of the month fall back to its last day.
pub fn fixed_month_trips(templates: &[FixedMonthTaskConfig], today: NaiveDate) -> Vec<Trip<'_>> {
    templates
        .iter()
        .filter_map(|template| {
            let trip = fixed_trip(template, today);
            if trip.is_none() {
                warn!(
                    route = %template.route.depart_city,
                    month_offset = template.month_offset,
                    "fixed-month task has no valid dates, skipped"
                );
            }
            trip
        })
        .collect()
}

fn fixed_trip(template: &FixedMonthTaskConfig, today: NaiveDate) -> Option<Trip<'_>> {
    let first = target_month(today, template.month_offset)?;
    let last_day = days_in_month(first)?;
    let depart = first.with_day(template.depart_day.clamp(1, last_day))?;
    let ret = first.with_day(template.return_day.clamp(1, last_day))?;
    Some(Trip {
        route: &template.route,
        params: &template.api_params,
        depart,
        ret,
        label: None,
    })
}
