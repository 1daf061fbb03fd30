// # Cron Expressions
//
// Five-field cron schedules (minute hour day-of-month month day-of-week)
// evaluated against local wall-clock time.
//
// Supported syntax per field: `*`, `n`, `a-b`, `*/s`, `a-b/s`, `a/s`,
// comma-separated lists, month names (`jan`..`dec`) and weekday names
// (`sun`..`sat`). Day-of-week accepts both 0 and 7 for Sunday. When both
// day-of-month and day-of-week are restricted a day matches if either
// does, as in Vixie cron.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike};
use std::str::FromStr;

use crate::error::Error;

/// How far ahead `next_after` searches before giving up
const SEARCH_HORIZON_DAYS: i64 = 366 * 5;

const MONTH_NAMES: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const WEEKDAY_NAMES: &[&str] = &["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
}

const MINUTE: FieldSpec = FieldSpec { name: "minute", min: 0, max: 59, names: &[] };
const HOUR: FieldSpec = FieldSpec { name: "hour", min: 0, max: 23, names: &[] };
const DAY_OF_MONTH: FieldSpec = FieldSpec { name: "day-of-month", min: 1, max: 31, names: &[] };
const MONTH: FieldSpec = FieldSpec { name: "month", min: 1, max: 12, names: MONTH_NAMES };
const DAY_OF_WEEK: FieldSpec = FieldSpec { name: "day-of-week", min: 0, max: 7, names: WEEKDAY_NAMES };

/// A parsed cron schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSchedule {
    /// Parse a cron expression
    pub fn parse(expression: &str) -> Result<Self, Error> {
        let expanded = match expression.trim().to_lowercase().as_str() {
            "@yearly" | "@annually" => "0 0 1 1 *".to_string(),
            "@monthly" => "0 0 1 * *".to_string(),
            "@weekly" => "0 0 * * 0".to_string(),
            "@daily" | "@midnight" => "0 0 * * *".to_string(),
            "@hourly" => "0 * * * *".to_string(),
            other => other.to_string(),
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields.as_slice() else {
            return Err(Error::config(format!(
                "cron expression '{}' must have 5 fields, got {}",
                expression,
                fields.len()
            )));
        };

        let mut days_of_week = parse_field(dow, &DAY_OF_WEEK)?;
        // 7 is an alias for Sunday
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            expression: expression.trim().to_string(),
            minutes: parse_field(minute, &MINUTE)?,
            hours: parse_field(hour, &HOUR)?,
            days_of_month: parse_field(dom, &DAY_OF_MONTH)?,
            months: parse_field(month, &MONTH)?,
            days_of_week,
            dom_restricted: !dom.starts_with('*'),
            dow_restricted: !dow.starts_with('*'),
        })
    }

    /// The expression this schedule was parsed from
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`, at minute resolution
    ///
    /// Returns `None` if the schedule never fires within five years
    /// (e.g. `0 0 31 2 *`). Local times skipped by a DST transition are
    /// not fired.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let start = after.naive_local().with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let horizon = start + Duration::days(SEARCH_HORIZON_DAYS);

        let mut t = start;
        while t <= horizon {
            if !contains(self.months, t.month()) {
                t = first_of_next_month(t)?;
                continue;
            }
            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !contains(self.hours, t.hour()) {
                t = t.date().and_hms_opt(t.hour(), 0, 0)? + Duration::hours(1);
                continue;
            }
            if !contains(self.minutes, t.minute()) {
                t += Duration::minutes(1);
                continue;
            }
            if let Some(fire) = tz.from_local_datetime(&t).earliest() {
                return Some(fire);
            }
            t += Duration::minutes(1);
        }

        None
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = contains(self.days_of_month, date.day());
        let dow = contains(self.days_of_week, date.weekday().num_days_from_sunday());

        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }
}

impl FromStr for CronSchedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression)
    }
}

fn contains(mask: u64, value: u32) -> bool {
    mask & (1u64 << value) != 0
}

fn first_of_next_month(t: NaiveDateTime) -> Option<NaiveDateTime> {
    let (year, month) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}

fn parse_field(text: &str, spec: &FieldSpec) -> Result<u64, Error> {
    let mut mask = 0u64;

    for part in text.split(',') {
        let invalid = || Error::config(format!("invalid cron {} field '{}'", spec.name, text));

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid())?;
                if step == 0 || step > spec.max {
                    return Err(invalid());
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (low, high) = if range == "*" {
            (spec.min, spec.max)
        } else if let Some((low, high)) = range.split_once('-') {
            (parse_value(low, spec).ok_or_else(invalid)?, parse_value(high, spec).ok_or_else(invalid)?)
        } else {
            let value = parse_value(range, spec).ok_or_else(invalid)?;
            match step {
                Some(_) => (value, spec.max),
                None => (value, value),
            }
        };

        if low > high {
            return Err(invalid());
        }

        let step = step.unwrap_or(1);
        let mut value = Some(low);
        while let Some(v) = value.filter(|v| *v <= high) {
            mask |= 1u64 << v;
            value = v.checked_add(step);
        }
    }

    Ok(mask)
}

fn parse_value(text: &str, spec: &FieldSpec) -> Option<u32> {
    let value = match text.parse::<u32>() {
        Ok(value) => value,
        Err(_) => {
            let index = spec.names.iter().position(|name| *name == text)?;
            // Month names start at 1, weekday names at 0
            u32::try_from(index).ok()? + spec.min
        }
    };

    (spec.min..=spec.max).contains(&value).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn next(expr: &str, after: &str) -> String {
        CronSchedule::parse(expr)
            .unwrap()
            .next_after(&at(after))
            .unwrap()
            .to_rfc3339()
    }

    #[test]
    fn every_minute() {
        assert_eq!(next("* * * * *", "2025-01-09T12:00:30Z"), "2025-01-09T12:01:00+00:00");
    }

    #[test]
    fn fire_time_is_strictly_after() {
        assert_eq!(next("0 * * * *", "2025-01-09T12:00:00Z"), "2025-01-09T13:00:00+00:00");
    }

    #[test]
    fn steps_and_ranges() {
        assert_eq!(next("*/15 * * * *", "2025-01-09T12:16:00Z"), "2025-01-09T12:30:00+00:00");
        assert_eq!(next("0 9-17/4 * * *", "2025-01-09T10:00:00Z"), "2025-01-09T13:00:00+00:00");
        assert_eq!(next("5,50 * * * *", "2025-01-09T12:06:00Z"), "2025-01-09T12:50:00+00:00");
    }

    #[test]
    fn rolls_over_month_and_year() {
        assert_eq!(next("0 0 1 * *", "2025-12-15T08:00:00Z"), "2026-01-01T00:00:00+00:00");
        assert_eq!(next("30 4 * feb *", "2025-03-01T00:00:00Z"), "2026-02-01T04:30:00+00:00");
    }

    #[test]
    fn weekday_names_and_sunday_alias() {
        // 2025-01-09 is a Thursday
        assert_eq!(next("0 8 * * mon", "2025-01-09T12:00:00Z"), "2025-01-13T08:00:00+00:00");
        assert_eq!(next("0 8 * * 7", "2025-01-09T12:00:00Z"), "2025-01-12T08:00:00+00:00");
    }

    #[test]
    fn restricted_dom_and_dow_match_either() {
        // 15th of the month or any Friday; the Friday (10th) comes first
        assert_eq!(next("0 0 15 * 5", "2025-01-09T12:00:00Z"), "2025-01-10T00:00:00+00:00");
    }

    #[test]
    fn macros_expand() {
        assert_eq!(next("@hourly", "2025-01-09T12:10:00Z"), "2025-01-09T13:00:00+00:00");
        assert_eq!(next("@daily", "2025-01-09T12:10:00Z"), "2025-01-10T00:00:00+00:00");
    }

    #[test]
    fn impossible_schedule_never_fires() {
        let schedule = CronSchedule::parse("0 0 31 2 *").unwrap();
        assert!(schedule.next_after(&at("2025-01-09T12:00:00Z")).is_none());
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        for expr in [
            "", "* * * *", "60 * * * *", "* 24 * * *", "*/0 * * * *", "5-1 * * * *", "* * * foo *",
            "5/4294967295 * * * *", "*/60 * * * *", "* * */32 * *",
        ] {
            assert!(CronSchedule::parse(expr).is_err(), "{:?} should be rejected", expr);
        }
    }
}
