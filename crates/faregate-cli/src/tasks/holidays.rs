use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, TimeDelta, Weekday};
use serde::Deserialize;
use tracing::debug;

use super::{Trip, same_month, target_month};
use crate::config::{Holiday, HolidayTaskConfig, RouteTemplate};

/// One trip per template and holiday in the template's target month.
///
/// A holiday is skipped when its description is empty, marks a
/// compensatory day off (`補`), contains one of the template's
/// `skip_keywords`, or falls inside a fixed-month trip on the same route.
pub fn holiday_trips<'a>(
    templates: &'a [HolidayTaskConfig],
    holidays: &'a [Holiday],
    today: NaiveDate,
    fixed: &[Trip<'_>],
) -> Vec<Trip<'a>> {
    let mut trips = Vec::new();
    for template in templates {
        let Some(first) = target_month(today, template.month_offset) else {
            continue;
        };
        for holiday in holidays.iter().filter(|h| same_month(h.date, first)) {
            if let Some(reason) = skip_reason(template, holiday, fixed) {
                debug!(
                    date = %holiday.date,
                    description = %holiday.description,
                    reason,
                    "holiday skipped"
                );
                continue;
            }
            let Some((depart, ret)) = travel_window(holiday.date, &holiday.description) else {
                continue;
            };
            trips.push(Trip {
                route: &template.route,
                params: &template.api_params,
                depart,
                ret,
                label: Some(holiday.description.as_str()),
            });
        }
    }
    trips
}

fn skip_reason(
    template: &HolidayTaskConfig,
    holiday: &Holiday,
    fixed: &[Trip<'_>],
) -> Option<&'static str> {
    let description = holiday.description.trim();
    if description.is_empty() {
        return Some("no description");
    }
    if description.contains('補') {
        return Some("compensatory day off");
    }
    if template
        .skip_keywords
        .iter()
        .any(|k| description.contains(k.as_str()))
    {
        return Some("skip keyword");
    }
    if covered_by_fixed_trip(&template.route, holiday.date, fixed) {
        return Some("inside a fixed-month trip");
    }
    None
}

fn covered_by_fixed_trip(route: &RouteTemplate, day: NaiveDate, fixed: &[Trip<'_>]) -> bool {
    fixed.iter().any(|trip| trip.covers(route, day))
}

/// Departure and return dates around a holiday, picked by its weekday so
/// the trip spans the long weekend.
///
/// 小年夜 opens the Lunar New Year break and gets a longer window.
/// 開國紀念日 on a Wednesday is covered by the days before it.
pub fn travel_window(day: NaiveDate, description: &str) -> Option<(NaiveDate, NaiveDate)> {
    use Weekday::*;

    let weekday = day.weekday();
    let (before, after) = if description.contains("開國紀念日") && weekday == Wed {
        (4, 0)
    } else if description.contains("小年夜") {
        match weekday {
            Mon | Thu | Fri => (2, 4),
            Tue | Wed => (4, 2),
            Sat | Sun => (2, 3),
        }
    } else {
        match weekday {
            Mon | Tue | Sun => (4, 0),
            Wed => (0, 3),
            Thu => (1, 3),
            Fri => (2, 2),
            Sat => (3, 1),
        }
    };
    let depart = day.checked_sub_signed(TimeDelta::days(before))?;
    let ret = day.checked_add_signed(TimeDelta::days(after))?;
    Some((depart, ret))
}

/// Entry of a TaiwanCalendar year file.
#[derive(Debug, Deserialize)]
struct CalendarDay {
    /// `YYYYMMDD`
    date: String,
    #[serde(rename = "isHoliday")]
    is_holiday: bool,
    #[serde(default)]
    description: String,
}

/// Read a TaiwanCalendar JSON file and keep the named holidays. Plain
/// weekends carry no description and are dropped.
pub fn load_calendar(path: &Path) -> Result<Vec<Holiday>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading holiday calendar at {:?}", path))?;
    // 配布ファイルは BOM 付きのことがある
    let contents = contents.trim_start_matches('\u{feff}');

    let days: Vec<CalendarDay> = serde_json::from_str(contents)
        .with_context(|| format!("parsing holiday calendar {:?}", path))?;

    days.into_iter()
        .filter(|d| d.is_holiday && !d.description.trim().is_empty())
        .map(|d| -> Result<Holiday> {
            let date = NaiveDate::parse_from_str(&d.date, "%Y%m%d").with_context(|| {
                format!("invalid date '{}' in holiday calendar {:?}", d.date, path)
            })?;
            Ok(Holiday {
                date,
                description: d.description,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use faregate_core::TaskParameters;
    use rstest::rstest;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn route(arrive_city: &str) -> RouteTemplate {
        RouteTemplate {
            depart_city: "TPE".into(),
            depart_country: "TW".into(),
            arrive_city: arrive_city.into(),
            arrive_country: "JP".into(),
        }
    }

    fn template(month_offset: u32) -> HolidayTaskConfig {
        HolidayTaskConfig {
            route: route("NRT"),
            month_offset,
            skip_keywords: vec!["春節".into(), "農曆除夕".into()],
            api_params: TaskParameters::new(),
        }
    }

    fn holiday(day: NaiveDate, description: &str) -> Holiday {
        Holiday {
            date: day,
            description: description.into(),
        }
    }

    // 2025-10-06 .. 2025-10-12 は月曜から日曜
    #[rstest]
    #[case::monday(date(2025, 10, 6), date(2025, 10, 2), date(2025, 10, 6))]
    #[case::tuesday(date(2025, 10, 7), date(2025, 10, 3), date(2025, 10, 7))]
    #[case::wednesday(date(2025, 10, 8), date(2025, 10, 8), date(2025, 10, 11))]
    #[case::thursday(date(2025, 10, 9), date(2025, 10, 8), date(2025, 10, 12))]
    #[case::friday(date(2025, 10, 10), date(2025, 10, 8), date(2025, 10, 12))]
    #[case::saturday(date(2025, 10, 11), date(2025, 10, 8), date(2025, 10, 12))]
    #[case::sunday(date(2025, 10, 12), date(2025, 10, 8), date(2025, 10, 12))]
    fn ordinary_holiday_window(
        #[case] day: NaiveDate,
        #[case] depart: NaiveDate,
        #[case] ret: NaiveDate,
    ) {
        assert_eq!(travel_window(day, "國慶日"), Some((depart, ret)));
    }

    #[rstest]
    #[case::monday(date(2025, 1, 27), date(2025, 1, 25), date(2025, 1, 31))]
    #[case::tuesday(date(2025, 1, 28), date(2025, 1, 24), date(2025, 1, 30))]
    #[case::saturday(date(2025, 1, 25), date(2025, 1, 23), date(2025, 1, 28))]
    fn lunar_new_year_eve_window(
        #[case] day: NaiveDate,
        #[case] depart: NaiveDate,
        #[case] ret: NaiveDate,
    ) {
        assert_eq!(travel_window(day, "小年夜"), Some((depart, ret)));
    }

    #[test]
    fn new_year_on_a_wednesday_looks_back() {
        assert_eq!(
            travel_window(date(2025, 1, 1), "開國紀念日"),
            Some((date(2024, 12, 28), date(2025, 1, 1)))
        );
        // 2026-01-01 は木曜なので通常ルール
        assert_eq!(
            travel_window(date(2026, 1, 1), "開國紀念日"),
            Some((date(2025, 12, 31), date(2026, 1, 4)))
        );
    }

    #[test]
    fn only_holidays_in_the_target_month_are_used() {
        let templates = [template(5)];
        let holidays = [
            holiday(date(2025, 9, 28), "教師節"),
            holiday(date(2025, 10, 6), "中秋節"),
            holiday(date(2025, 10, 10), "國慶日"),
            holiday(date(2025, 11, 1), "other"),
        ];

        let trips = holiday_trips(&templates, &holidays, date(2025, 5, 20), &[]);
        let names: Vec<_> = trips.iter().map(Trip::name).collect();
        assert_eq!(
            names,
            [
                "TPE-NRT 中秋節 2025-10-02/2025-10-06",
                "TPE-NRT 國慶日 2025-10-08/2025-10-12",
            ]
        );
    }

    #[test]
    fn skip_rules_drop_holidays() {
        let templates = [template(5)];
        let holidays = [
            holiday(date(2025, 10, 3), ""),
            holiday(date(2025, 10, 24), "臺灣光復節補假"),
            holiday(date(2025, 10, 27), "春節"),
            holiday(date(2025, 10, 10), "國慶日"),
        ];

        let trips = holiday_trips(&templates, &holidays, date(2025, 5, 20), &[]);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].label, Some("國慶日"));
    }

    #[test]
    fn custom_skip_keywords_replace_the_defaults() {
        let mut t = template(5);
        t.skip_keywords = vec!["國慶".into()];
        let templates = [t];
        let holidays = [
            holiday(date(2025, 10, 10), "國慶日"),
            holiday(date(2025, 10, 27), "春節"),
        ];

        let trips = holiday_trips(&templates, &holidays, date(2025, 5, 20), &[]);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].label, Some("春節"));
    }

    #[test]
    fn holiday_inside_a_fixed_trip_on_the_same_route_is_skipped() {
        let templates = [template(5)];
        let holidays = [holiday(date(2025, 10, 10), "國慶日")];
        let params = TaskParameters::new();
        let same = route("NRT");
        let other = route("KIX");
        let fixed_same = [Trip {
            route: &same,
            params: &params,
            depart: date(2025, 10, 5),
            ret: date(2025, 10, 10),
            label: None,
        }];
        let fixed_other = [Trip {
            route: &other,
            ..fixed_same[0].clone()
        }];

        let today = date(2025, 5, 20);
        assert!(holiday_trips(&templates, &holidays, today, &fixed_same).is_empty());
        assert_eq!(
            holiday_trips(&templates, &holidays, today, &fixed_other).len(),
            1
        );
    }
}
