//! Five field cron expressions (`minute hour day-of-month month day-of-week`) evaluated in a
//! caller supplied time zone.

use std::{fmt::Display, str::FromStr};

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use thiserror::Error;

/// Expressions that never fire (`0 0 30 2 *`) give up after this many days.
const SEARCH_HORIZON_DAYS: i64 = 366 * 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CronError {
    #[error("Expected 5 fields, got {0}")]
    FieldCount(usize),

    #[error("Invalid {field} value `{token}`")]
    InvalidValue { field: CronField, token: String },

    #[error("{field} value {value} is outside of {min}-{max}")]
    OutOfRange {
        field: CronField,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("Unknown macro `{0}`")]
    UnknownMacro(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronField {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl CronField {
    fn range(&self) -> (u32, u32) {
        match self {
            CronField::Minute => (0, 59),
            CronField::Hour => (0, 23),
            CronField::DayOfMonth => (1, 31),
            CronField::Month => (1, 12),
            // 7 is accepted as a second name for sunday.
            CronField::DayOfWeek => (0, 7),
        }
    }

    fn names(&self) -> &'static [&'static str] {
        match self {
            CronField::Month => &[
                "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
            ],
            CronField::DayOfWeek => &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"],
            CronField::Minute | CronField::Hour | CronField::DayOfMonth => &[],
        }
    }
}

impl Display for CronField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CronField::Minute => write!(f, "minute"),
            CronField::Hour => write!(f, "hour"),
            CronField::DayOfMonth => write!(f, "day of month"),
            CronField::Month => write!(f, "month"),
            CronField::DayOfWeek => write!(f, "day of week"),
        }
    }
}

/// Parsed expression. Every field is stored as a bit set of allowed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minutes: u64,
    hours: u32,
    days_of_month: u32,
    months: u16,
    days_of_week: u8,
    /// Standard cron quirk: when both day fields are restricted a day matches if either does.
    day_of_month_any: bool,
    day_of_week_any: bool,
}

impl FromStr for CronSchedule {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let expression = s.trim();
        let expanded = match expression {
            v if v.starts_with('@') => match v.to_ascii_lowercase().as_str() {
                "@yearly" | "@annually" => "0 0 1 1 *",
                "@monthly" => "0 0 1 * *",
                "@weekly" => "0 0 * * 0",
                "@daily" | "@midnight" => "0 0 * * *",
                "@hourly" => "0 * * * *",
                _ => return Err(CronError::UnknownMacro(v.to_string())),
            },
            v => v,
        };

        let fields = expanded.split_whitespace().collect::<Vec<_>>();
        let &[minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
            return Err(CronError::FieldCount(fields.len()));
        };

        let mut days_of_week = parse_field(day_of_week, CronField::DayOfWeek)?;
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week | 1) & !(1 << 7);
        }

        Ok(Self {
            minutes: parse_field(minute, CronField::Minute)?,
            hours: parse_field(hour, CronField::Hour)? as u32,
            days_of_month: parse_field(day_of_month, CronField::DayOfMonth)? as u32,
            months: parse_field(month, CronField::Month)? as u16,
            days_of_week: days_of_week as u8,
            day_of_month_any: day_of_month == "*" || day_of_month == "?",
            day_of_week_any: day_of_week == "*" || day_of_week == "?",
        })
    }
}

fn parse_field(field: &str, kind: CronField) -> Result<u64, CronError> {
    let (min, max) = kind.range();
    let invalid = || CronError::InvalidValue {
        field: kind,
        token: field.to_string(),
    };

    let mut set = 0u64;
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step = step.parse::<u32>().map_err(|_| invalid())?;
                if step == 0 || step > max - min + 1 {
                    return Err(invalid());
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (start, end) = match range {
            "*" | "?" => (min, max),
            range => match range.split_once('-') {
                Some((start, end)) => (
                    parse_value(start, kind).ok_or_else(invalid)?,
                    parse_value(end, kind).ok_or_else(invalid)?,
                ),
                // `5/15` means every 15 starting from 5.
                None if part.contains('/') => (parse_value(range, kind).ok_or_else(invalid)?, max),
                None => {
                    let value = parse_value(range, kind).ok_or_else(invalid)?;
                    (value, value)
                }
            },
        };

        for value in [start, end] {
            if value < min || value > max {
                return Err(CronError::OutOfRange {
                    field: kind,
                    value,
                    min,
                    max,
                });
            }
        }
        if start > end {
            return Err(invalid());
        }

        let mut value = start;
        while value <= end {
            set |= 1 << value;
            value += step;
        }
    }
    Ok(set)
}

fn parse_value(token: &str, kind: CronField) -> Option<u32> {
    if let Ok(v) = token.parse::<u32>() {
        return Some(v);
    }
    let offset = if kind == CronField::Month { 1 } else { 0 };
    kind.names()
        .iter()
        .position(|v| v.eq_ignore_ascii_case(token))
        .map(|v| v as u32 + offset)
}

impl CronSchedule {
    /// First occurrence strictly after `after`.
    pub fn next_after<Tz: TimeZone>(&self, after: DateTime<Utc>, tz: &Tz) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(tz).naive_local();
        let minute_floor = local.with_second(0)?.with_nanosecond(0)?;
        self.search(minute_floor + Duration::minutes(1), tz)
            .filter(|v| *v > after)
    }

    /// First occurrence at `from` or later.
    pub fn first_at_or_after<Tz: TimeZone>(
        &self,
        from: DateTime<Utc>,
        tz: &Tz,
    ) -> Option<DateTime<Utc>> {
        let local = from.with_timezone(tz).naive_local();
        let minute_floor = local.with_second(0)?.with_nanosecond(0)?;
        let start = if minute_floor == local {
            local
        } else {
            minute_floor + Duration::minutes(1)
        };
        self.search(start, tz).filter(|v| *v >= from)
    }

    fn search<Tz: TimeZone>(&self, start: NaiveDateTime, tz: &Tz) -> Option<DateTime<Utc>> {
        let mut date = start.date();
        let mut from_time = start.time();
        for _ in 0..SEARCH_HORIZON_DAYS {
            if self.matches_date(date) {
                for time in self.times_from(from_time) {
                    // Local times skipped by a DST transition don't exist and are passed over.
                    if let Some(v) = tz.from_local_datetime(&date.and_time(time)).earliest() {
                        return Some(v.to_utc());
                    }
                }
            }
            date = date.succ_opt()?;
            from_time = NaiveTime::MIN;
        }
        None
    }

    fn matches_date(&self, date: NaiveDate) -> bool {
        if self.months & (1 << date.month()) == 0 {
            return false;
        }
        let day_of_month = self.days_of_month & (1 << date.day()) != 0;
        let day_of_week = self.days_of_week & (1 << date.weekday().num_days_from_sunday()) != 0;
        match (self.day_of_month_any, self.day_of_week_any) {
            (false, false) => day_of_month || day_of_week,
            (true, false) => day_of_week,
            (false, true) => day_of_month,
            (true, true) => true,
        }
    }

    fn times_from(&self, from: NaiveTime) -> impl Iterator<Item = NaiveTime> {
        let hours = self.hours;
        let minutes = self.minutes;
        (from.hour()..24)
            .filter(move |hour| hours & (1 << hour) != 0)
            .flat_map(move |hour| {
                let first_minute = if hour == from.hour() { from.minute() } else { 0 };
                (first_minute..60)
                    .filter(move |minute| minutes & (1 << minute) != 0)
                    .filter_map(move |minute| NaiveTime::from_hms_opt(hour, minute, 0))
            })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, FixedOffset, TimeZone, Utc};

    use super::{CronError, CronField, CronSchedule};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn cron(v: &str) -> CronSchedule {
        v.parse().unwrap()
    }

    #[test]
    fn daily_next_after() {
        let daily = cron("0 8 * * *");
        assert_eq!(
            daily.next_after(utc(2024, 4, 7, 8, 0, 1), &Utc),
            Some(utc(2024, 4, 8, 8, 0, 0))
        );
        assert_eq!(
            daily.next_after(utc(2024, 4, 8, 8, 0, 0), &Utc),
            Some(utc(2024, 4, 9, 8, 0, 0))
        );
        assert_eq!(
            daily.first_at_or_after(utc(2024, 4, 8, 8, 0, 0), &Utc),
            Some(utc(2024, 4, 8, 8, 0, 0))
        );
        assert_eq!(
            daily.first_at_or_after(utc(2024, 4, 8, 8, 0, 1), &Utc),
            Some(utc(2024, 4, 9, 8, 0, 0))
        );
    }

    #[test]
    fn steps_lists_and_names() {
        let schedule = cron("*/20 9-17/4 * JAN,mar MON-FRI");
        // Saturday 2024-03-02 is skipped.
        assert_eq!(
            schedule.next_after(utc(2024, 3, 1, 17, 40, 0), &Utc),
            Some(utc(2024, 3, 4, 9, 0, 0))
        );
        assert_eq!(
            schedule.next_after(utc(2024, 3, 4, 9, 0, 0), &Utc),
            Some(utc(2024, 3, 4, 9, 20, 0))
        );
        // February isn't in the list.
        assert_eq!(
            schedule.next_after(utc(2024, 1, 31, 18, 0, 0), &Utc),
            Some(utc(2024, 3, 1, 9, 0, 0))
        );

        assert_eq!(
            cron("5/15 * * * *").next_after(utc(2024, 1, 1, 0, 50, 0), &Utc),
            Some(utc(2024, 1, 1, 1, 5, 0))
        );
    }

    #[test]
    fn times_in_dst_gap_are_skipped() {
        let tz = chrono_tz::Europe::Berlin;
        // 2024-03-31 02:00 CET jumps to 03:00 CEST.
        assert_eq!(
            cron("30 2 * * *").next_after(utc(2024, 3, 30, 12, 0, 0), &tz),
            Some(utc(2024, 4, 1, 0, 30, 0))
        );
        assert_eq!(
            cron("0 * * * *").next_after(utc(2024, 3, 31, 0, 30, 0), &tz),
            Some(utc(2024, 3, 31, 1, 0, 0))
        );
    }

    #[test]
    fn ambiguous_times_fire_once_at_the_earliest_instant() {
        let tz = chrono_tz::Europe::Berlin;
        let schedule = cron("30 2 * * *");
        // 2024-10-27 02:00-03:00 happens twice, first in CEST then in CET.
        assert_eq!(
            schedule.next_after(utc(2024, 10, 26, 12, 0, 0), &tz),
            Some(utc(2024, 10, 27, 0, 30, 0))
        );
        assert_eq!(
            schedule.next_after(utc(2024, 10, 27, 0, 30, 0), &tz),
            Some(utc(2024, 10, 28, 1, 30, 0))
        );
    }

    #[test]
    fn sunday_as_seven_and_day_union() {
        assert_eq!(cron("0 0 * * 7"), cron("0 0 * * 0"));
        assert_eq!(cron("@weekly"), cron("0 0 * * SUN"));

        // Either the 13th or a friday.
        let schedule = cron("0 12 13 * 5");
        assert_eq!(
            schedule.next_after(utc(2024, 9, 10, 0, 0, 0), &Utc),
            Some(utc(2024, 9, 13, 12, 0, 0))
        );
        assert_eq!(
            schedule.next_after(utc(2024, 9, 13, 12, 0, 0), &Utc),
            Some(utc(2024, 9, 20, 12, 0, 0))
        );
    }

    #[test]
    fn evaluates_in_time_zone() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(
            cron("@daily").next_after(utc(2024, 4, 7, 23, 0, 0), &tz),
            Some(utc(2024, 4, 8, 22, 0, 0))
        );
    }

    #[test]
    fn impossible_and_leap_dates() {
        assert_eq!(cron("0 0 30 2 *").next_after(utc(2024, 1, 1, 0, 0, 0), &Utc), None);
        assert_eq!(
            cron("0 0 29 2 *").next_after(utc(2024, 3, 1, 0, 0, 0), &Utc),
            Some(utc(2028, 2, 29, 0, 0, 0))
        );
    }

    #[test]
    fn rejects_bad_expressions() {
        assert_eq!("0 8 * *".parse::<CronSchedule>(), Err(CronError::FieldCount(4)));
        assert_eq!(
            "61 * * * *".parse::<CronSchedule>(),
            Err(CronError::OutOfRange {
                field: CronField::Minute,
                value: 61,
                min: 0,
                max: 59
            })
        );
        assert!(matches!(
            "* * * FOO *".parse::<CronSchedule>(),
            Err(CronError::InvalidValue {
                field: CronField::Month,
                ..
            })
        ));
        assert!("*/0 * * * *".parse::<CronSchedule>().is_err());
        assert!(matches!(
            "59/4294967295 * * * *".parse::<CronSchedule>(),
            Err(CronError::InvalidValue {
                field: CronField::Minute,
                ..
            })
        ));
        assert!("* * */32 * *".parse::<CronSchedule>().is_err());
        assert!("*/60 * * * *".parse::<CronSchedule>().is_ok());
        assert!("5-1 * * * *".parse::<CronSchedule>().is_err());
        assert_eq!(
            "@sometimes".parse::<CronSchedule>(),
            Err(CronError::UnknownMacro("@sometimes".into()))
        );
    }
}
