use std::{fmt::Display, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::payload::EventPayload;

/// Kind of source a bucket captures. Export files carry free-form type strings such as
/// `currentwindow`, `app.editor.activity`, `web.tab.current` or `afkstatus`, so classification is
/// done by substring and anything unrecognized keeps its original name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketType {
    Window,
    Editor,
    Browser,
    AfkStatus,
    Other(Arc<str>),
}

impl BucketType {
    pub fn classify(type_name: &str) -> Self {
        let lower = type_name.to_ascii_lowercase();
        if lower.contains("afk") {
            BucketType::AfkStatus
        } else if lower.contains("editor") {
            BucketType::Editor
        } else if lower.contains("web") || lower.contains("browser") {
            BucketType::Browser
        } else if lower.contains("window") {
            BucketType::Window
        } else {
            BucketType::Other(type_name.into())
        }
    }

    pub fn is_afk(&self) -> bool {
        matches!(self, BucketType::AfkStatus)
    }
}

impl Display for BucketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BucketType::Window => write!(f, "window"),
            BucketType::Editor => write!(f, "editor"),
            BucketType::Browser => write!(f, "browser"),
            BucketType::AfkStatus => write!(f, "afkstatus"),
            BucketType::Other(name) => write!(f, "{name}"),
        }
    }
}

/// A single captured event as it appears in an export. Never modified after parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
    pub bucket_id: Arc<str>,
    pub bucket_type: BucketType,
    pub payload: EventPayload,
}

/// Canonical event used by the timeline. Produced by [normalize](super::normalizer::normalize).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub id: Arc<str>,
    pub bucket_id: Arc<str>,
    pub bucket_type: BucketType,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
    pub display_name: Arc<str>,
    pub color: &'static str,
    pub hidden: bool,
}

impl NormalizedEvent {
    /// Durations are kept with millisecond precision. Anything finer is rounding noise from the
    /// exporter.
    pub fn duration(&self) -> Duration {
        seconds_to_duration(self.duration_seconds)
    }

    /// Saturates at the largest representable instant.
    pub fn end(&self) -> DateTime<Utc> {
        self.timestamp
            .checked_add_signed(self.duration())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn set_end(&mut self, end: DateTime<Utc>) {
        self.duration_seconds = duration_to_seconds(end - self.timestamp);
    }

    pub fn is_afk(&self) -> bool {
        self.bucket_type.is_afk()
    }

    /// Part of the event that falls into `[from, to)`. Empty overlaps yield `None`.
    pub fn clamp(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Option<NormalizedEvent> {
        let start = self.timestamp.max(from);
        let end = self.end().min(to);
        if end <= start {
            return None;
        }
        let mut clipped = self.clone();
        clipped.timestamp = start;
        clipped.set_end(end);
        Some(clipped)
    }
}

pub fn seconds_to_duration(seconds: f64) -> Duration {
    if !seconds.is_finite() || seconds <= 0. {
        return Duration::zero();
    }
    Duration::milliseconds((seconds * 1000.).round() as i64)
}

pub fn duration_to_seconds(duration: Duration) -> f64 {
    duration.num_milliseconds().max(0) as f64 / 1000.
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{BucketType, NormalizedEvent};

    #[test]
    fn classify_known_bucket_types() {
        assert_eq!(BucketType::classify("currentwindow"), BucketType::Window);
        assert_eq!(BucketType::classify("app.editor.activity"), BucketType::Editor);
        assert_eq!(BucketType::classify("web.tab.current"), BucketType::Browser);
        assert_eq!(BucketType::classify("afkstatus"), BucketType::AfkStatus);
        assert_eq!(
            BucketType::classify("os.hid.input"),
            BucketType::Other("os.hid.input".into())
        );
    }

    #[test]
    fn clamp_cuts_both_sides() {
        let start = Utc.with_ymd_and_hms(2024, 4, 5, 12, 0, 0).unwrap();
        let event = NormalizedEvent {
            id: "b@0".into(),
            bucket_id: "b".into(),
            bucket_type: BucketType::Window,
            timestamp: start,
            duration_seconds: 600.,
            display_name: "Firefox".into(),
            color: "blue",
            hidden: false,
        };

        let clipped = event
            .clamp(start + Duration::minutes(2), start + Duration::minutes(5))
            .unwrap();
        assert_eq!(clipped.timestamp, start + Duration::minutes(2));
        assert_eq!(clipped.duration_seconds, 180.);

        assert!(event
            .clamp(start + Duration::minutes(10), start + Duration::minutes(20))
            .is_none());
    }

    #[test]
    fn end_saturates() {
        let start = Utc.with_ymd_and_hms(2024, 4, 5, 12, 0, 0).unwrap();
        let event = NormalizedEvent {
            id: "b@0".into(),
            bucket_id: "b".into(),
            bucket_type: BucketType::Window,
            timestamp: start,
            duration_seconds: 1e15,
            display_name: "Firefox".into(),
            color: "blue",
            hidden: false,
        };

        assert_eq!(event.end(), DateTime::<Utc>::MAX_UTC);
        let clipped = event.clamp(start, start + Duration::hours(1)).unwrap();
        assert_eq!(clipped.duration_seconds, 3600.);
    }
}
