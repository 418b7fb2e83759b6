use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// Calendar date of `instant` as seen in `tz`.
pub fn local_date<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// First instant of `date` in `tz`. When midnight doesn't exist locally (DST gap) the first
/// existing minute after it is used.
pub fn local_day_start<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let mut time = date.and_time(NaiveTime::MIN);
    // A DST gap never lasts longer than a few hours.
    for _ in 0..(4 * 60) {
        if let Some(v) = tz.from_local_datetime(&time).earliest() {
            return v.to_utc();
        }
        time += Duration::minutes(1);
    }
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Exclusive end of `date` in `tz`, which is the start of the following day.
pub fn local_day_end<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    match date.succ_opt() {
        Some(next) => local_day_start(next, tz),
        None => local_day_start(date, tz) + Duration::days(1),
    }
}

/// Last representable millisecond of `date` in `tz` (23:59:59.999).
pub fn local_day_last_millisecond<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    local_day_end(date, tz) - Duration::milliseconds(1)
}
