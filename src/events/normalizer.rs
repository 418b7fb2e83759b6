use std::{collections::HashMap, sync::Arc};

use chrono::Duration;
use tracing::{debug, instrument};

use crate::utils::clock::Clock;

use super::{
    color::color_for,
    import::ImportedBucket,
    model::{duration_to_seconds, seconds_to_duration, NormalizedEvent, RawEvent},
};

/// Events of the same activity that are this close are considered a single capture.
pub const MAX_MERGE_GAP: Duration = Duration::seconds(1);

/// Exporters round timestamps and durations independently, which can open up a gap of a
/// millisecond between events that were contiguous.
const ROUNDING_TOLERANCE: Duration = Duration::milliseconds(1);

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Events that started earlier than this many days before now are dropped.
    pub days_back: u32,
    pub min_duration_seconds: f64,
    /// Display names that should be marked as hidden.
    pub hidden_names: Vec<String>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            days_back: 7,
            min_duration_seconds: 0.,
            hidden_names: vec![],
        }
    }
}

/// Turns imported buckets into a sorted, deduplicated list of events.
#[instrument(skip_all, fields(buckets = buckets.len()))]
pub fn normalize(
    buckets: &[ImportedBucket],
    options: &NormalizeOptions,
    clock: &dyn Clock,
) -> Vec<NormalizedEvent> {
    let cutoff = clock.time() - Duration::days(options.days_back as i64);

    let mut events = buckets
        .iter()
        .flat_map(|bucket| bucket.events.iter())
        .filter(|v| v.timestamp >= cutoff)
        .filter(|v| v.duration_seconds >= options.min_duration_seconds)
        .map(|v| normalize_event(v, options))
        .collect::<Vec<_>>();
    let total = events.len();

    // `sort_by_key` is stable, so ties keep ingestion order.
    events.sort_by_key(|v| v.timestamp);
    let events = dedup(events);

    debug!("Normalized {total} events into {}", events.len());
    events
}

fn normalize_event(event: &RawEvent, options: &NormalizeOptions) -> NormalizedEvent {
    let display_name = event.payload.display_name(&event.bucket_type);
    let color = color_for(&display_name, &event.bucket_type);
    let hidden = options.hidden_names.iter().any(|v| *v == display_name);
    NormalizedEvent {
        id: format!("{}@{}", event.bucket_id, event.timestamp.timestamp_millis()).into(),
        bucket_id: event.bucket_id.clone(),
        bucket_type: event.bucket_type.clone(),
        timestamp: event.timestamp,
        // Rounded to milliseconds, which keeps repeated normalization stable.
        duration_seconds: duration_to_seconds(seconds_to_duration(event.duration_seconds)),
        display_name: display_name.into(),
        color,
        hidden,
    }
}

/// Merges adjacent or overlapping captures of the same activity in the same bucket. Expects events
/// sorted by timestamp and keeps them sorted. Running it on its own output changes nothing.
pub fn dedup(events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
    let mut result: Vec<NormalizedEvent> = Vec::with_capacity(events.len());
    // Index of the last emitted event for every bucket.
    let mut last_in_bucket = HashMap::<Arc<str>, usize>::new();

    for event in events {
        if let Some(&index) = last_in_bucket.get(&event.bucket_id) {
            let previous = &mut result[index];
            if previous.display_name == event.display_name
                && event.timestamp - previous.end() <= MAX_MERGE_GAP + ROUNDING_TOLERANCE
            {
                let end = previous.end().max(event.end());
                previous.set_end(end);
                continue;
            }
        }
        last_in_bucket.insert(event.bucket_id.clone(), result.len());
        result.push(event);
    }

    result
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    use super::{dedup, normalize, NormalizeOptions};
    use crate::{
        events::{
            import::ImportedBucket,
            model::{BucketType, NormalizedEvent, RawEvent},
            payload::EventPayload,
        },
        utils::{clock::FixedClock, logging::TEST_LOGGING},
    };

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 5, 12, 0, 0).unwrap()
    }

    fn raw(
        bucket: &str,
        bucket_type: BucketType,
        offset_ms: i64,
        seconds: f64,
        data: serde_json::Value,
    ) -> RawEvent {
        let serde_json::Value::Object(data) = data else {
            panic!("data must be an object")
        };
        RawEvent {
            timestamp: start() + Duration::milliseconds(offset_ms),
            duration_seconds: seconds,
            bucket_id: bucket.into(),
            payload: EventPayload::from_data(&bucket_type, data),
            bucket_type,
        }
    }

    fn bucket(id: &str, bucket_type: BucketType, events: Vec<RawEvent>) -> ImportedBucket {
        ImportedBucket {
            id: Arc::from(id),
            bucket_type,
            events,
        }
    }

    fn clock() -> FixedClock {
        FixedClock(start() + Duration::hours(1))
    }

    fn covered(events: &[NormalizedEvent]) -> f64 {
        events.iter().map(|v| v.duration_seconds).sum()
    }

    #[test]
    fn merges_close_editor_events() {
        *TEST_LOGGING;
        let editor = json!({"file": "/src/main.go"});
        let events = normalize(
            &[bucket(
                "editor",
                BucketType::Editor,
                vec![
                    raw("editor", BucketType::Editor, 0, 10., editor.clone()),
                    raw("editor", BucketType::Editor, 10_500, 5., editor),
                ],
            )],
            &NormalizeOptions::default(),
            &clock(),
        );

        assert_eq!(events.len(), 1);
        assert_eq!(&*events[0].display_name, "Editor: main.go");
        assert_eq!(events[0].duration_seconds, 15.5);
        assert_eq!(events[0].timestamp, start());
    }

    #[test]
    fn keeps_distant_or_foreign_events_apart() {
        let firefox = json!({"app": "Firefox"});
        let events = normalize(
            &[
                bucket(
                    "window",
                    BucketType::Window,
                    vec![
                        raw("window", BucketType::Window, 0, 10., firefox.clone()),
                        raw("window", BucketType::Window, 12_000, 10., firefox.clone()),
                    ],
                ),
                bucket(
                    "window-2",
                    BucketType::Window,
                    vec![raw("window-2", BucketType::Window, 10_000, 10., firefox)],
                ),
            ],
            &NormalizeOptions::default(),
            &clock(),
        );

        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|v| v[0].timestamp <= v[1].timestamp));
        assert_eq!(&*events[1].bucket_id, "window-2");
    }

    #[test]
    fn overlapping_captures_collapse() {
        let code = json!({"app": "Code"});
        let events = normalize(
            &[bucket(
                "window",
                BucketType::Window,
                vec![
                    raw("window", BucketType::Window, 0, 30., code.clone()),
                    raw("window", BucketType::Window, 5_000, 10., code.clone()),
                    raw("window", BucketType::Window, 20_000, 20., code),
                ],
            )],
            &NormalizeOptions::default(),
            &clock(),
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].duration_seconds, 40.);
    }

    #[test]
    fn filters_old_and_short_events() {
        let slack = json!({"app": "Slack"});
        let old = RawEvent {
            timestamp: start() - Duration::days(10),
            ..raw("window", BucketType::Window, 0, 60., slack.clone())
        };
        let events = normalize(
            &[bucket(
                "window",
                BucketType::Window,
                vec![
                    old,
                    raw("window", BucketType::Window, 0, 0.5, slack.clone()),
                    raw("window", BucketType::Window, 60_000, 30., slack),
                ],
            )],
            &NormalizeOptions {
                days_back: 7,
                min_duration_seconds: 1.,
                hidden_names: vec!["Slack".into()],
            },
            &clock(),
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, start() + Duration::minutes(1));
        assert!(events[0].hidden);
    }

    #[test]
    fn dedup_is_idempotent() {
        let a = json!({"app": "A"});
        let b = json!({"app": "B"});
        let once = normalize(
            &[
                bucket(
                    "window",
                    BucketType::Window,
                    vec![
                        raw("window", BucketType::Window, 0, 1.2345, a.clone()),
                        raw("window", BucketType::Window, 1_235, 3., a.clone()),
                        raw("window", BucketType::Window, 4_000, 2., b.clone()),
                        raw("window", BucketType::Window, 6_400, 2., a.clone()),
                        raw("window", BucketType::Window, 9_000, 2., a),
                    ],
                ),
                bucket(
                    "afk",
                    BucketType::AfkStatus,
                    vec![raw("afk", BucketType::AfkStatus, 0, 20., json!({"status": "not-afk"}))],
                ),
            ],
            &NormalizeOptions::default(),
            &clock(),
        );
        let twice = dedup(once.clone());

        assert_eq!(once, twice);
        assert_eq!(covered(&once), covered(&twice));
        assert_eq!(once.iter().filter(|v| &*v.display_name == "A").count(), 2);
    }
}
