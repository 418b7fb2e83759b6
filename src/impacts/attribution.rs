use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, instrument};

use crate::utils::{
    clock::Clock,
    time::{local_date, local_day_end, local_day_last_millisecond},
};

use super::model::{DurationSegment, Impact};

/// Attributes every impact to the local days it occupies. An impact lasts until the next
/// check-in; the last one lasts until now when it started today, otherwise until the end of its
/// day. Results that contain a running segment are only valid at the time of the call.
#[instrument(skip_all, fields(impacts = impacts.len()))]
pub fn attribute<Tz: TimeZone>(
    impacts: &[Impact],
    tz: &Tz,
    clock: &dyn Clock,
) -> Vec<DurationSegment> {
    let mut sorted = impacts.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|v| v.timestamp);

    let now = clock.time();
    let today = local_date(now, tz);

    let segments = sorted
        .iter()
        .enumerate()
        .flat_map(|(index, impact)| {
            let (end, running) = match sorted.get(index + 1) {
                Some(next) => (next.timestamp, false),
                None => {
                    let day = local_date(impact.timestamp, tz);
                    if day == today {
                        (now, true)
                    } else {
                        (local_day_last_millisecond(day, tz), false)
                    }
                }
            };
            split_by_day(impact, end, running, tz)
        })
        .collect::<Vec<_>>();

    debug!("Attributed {} impacts into {} segments", impacts.len(), segments.len());
    segments
}

/// Cuts `[impact.timestamp, end)` at every local midnight. Empty or inverted intervals produce
/// nothing.
fn split_by_day<Tz: TimeZone>(
    impact: &Impact,
    end: DateTime<Utc>,
    running: bool,
    tz: &Tz,
) -> Vec<DurationSegment> {
    let mut segments = vec![];
    let mut cursor = impact.timestamp;
    while cursor < end {
        let day = local_date(cursor, tz);
        let segment_end = local_day_end(day, tz).min(end);
        segments.push(DurationSegment {
            day,
            goal_id: impact.goal_id.clone(),
            activity_name: impact.activity_name.clone(),
            start: cursor,
            end: segment_end,
            running,
        });
        cursor = segment_end;
    }
    segments
}
