//! Shape validation of an exported event document:
//!
//! ```json
//! { "buckets": { "<id>": { "id": "..", "type": "..", "events": [
//!     { "timestamp": "2024-04-05T12:00:00Z", "duration": 12.5, "data": { } } ] } } }
//! ```
//!
//! A document either parses completely or not at all.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::{
    model::{seconds_to_duration, BucketType, RawEvent},
    payload::EventPayload,
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Export is missing a `buckets` object")]
    MissingBuckets,

    #[error("Bucket {bucket} is not an object")]
    InvalidBucket { bucket: String },

    #[error("Invalid event {index} in bucket {bucket}: {reason}")]
    InvalidEvent {
        bucket: String,
        index: usize,
        reason: String,
    },
}

/// Events of a single bucket, in the order they appear in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedBucket {
    pub id: Arc<str>,
    pub bucket_type: BucketType,
    pub events: Vec<RawEvent>,
}

pub fn parse_export(document: &str) -> Result<Vec<ImportedBucket>, ImportError> {
    let root: Value = serde_json::from_str(document)?;
    let Some(buckets) = root.get("buckets").and_then(Value::as_object) else {
        return Err(ImportError::MissingBuckets);
    };

    let buckets = buckets
        .iter()
        .map(|(key, bucket)| parse_bucket(key, bucket))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        "Parsed export with {} buckets and {} events",
        buckets.len(),
        buckets.iter().map(|v| v.events.len()).sum::<usize>()
    );
    Ok(buckets)
}

fn parse_bucket(key: &str, bucket: &Value) -> Result<ImportedBucket, ImportError> {
    let Some(bucket) = bucket.as_object() else {
        return Err(ImportError::InvalidBucket {
            bucket: key.to_string(),
        });
    };
    let id: Arc<str> = bucket
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or(key)
        .into();
    // Some exporters omit the type and encode it into the id instead, e.g. `aw-watcher-afk_host`.
    let bucket_type =
        BucketType::classify(bucket.get("type").and_then(Value::as_str).unwrap_or(&*id));

    let events = match bucket.get("events") {
        None | Some(Value::Null) => vec![],
        Some(Value::Array(events)) => events
            .iter()
            .enumerate()
            .map(|(index, event)| parse_event(&id, &bucket_type, index, event))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(ImportError::InvalidBucket {
                bucket: key.to_string(),
            })
        }
    };

    Ok(ImportedBucket {
        id,
        bucket_type,
        events,
    })
}

fn parse_event(
    bucket_id: &Arc<str>,
    bucket_type: &BucketType,
    index: usize,
    event: &Value,
) -> Result<RawEvent, ImportError> {
    let invalid = |reason: &str| ImportError::InvalidEvent {
        bucket: bucket_id.to_string(),
        index,
        reason: reason.to_string(),
    };

    let event = event.as_object().ok_or_else(|| invalid("not an object"))?;
    let timestamp = event
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing timestamp"))?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| invalid(&format!("bad timestamp {timestamp}: {e}")))?
        .with_timezone(&Utc);
    let duration_seconds = match event.get("duration") {
        None | Some(Value::Null) => 0.,
        Some(v) => v.as_f64().ok_or_else(|| invalid("duration is not a number"))?,
    };
    if !duration_seconds.is_finite() || duration_seconds < 0. {
        return Err(invalid("duration must be a non-negative number"));
    }
    if timestamp
        .checked_add_signed(seconds_to_duration(duration_seconds))
        .is_none()
    {
        return Err(invalid("event ends outside of the representable range"));
    }
    let data = match event.get("data") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(data)) => data.clone(),
        Some(_) => return Err(invalid("data is not an object")),
    };

    Ok(RawEvent {
        timestamp,
        duration_seconds,
        bucket_id: bucket_id.clone(),
        bucket_type: bucket_type.clone(),
        payload: EventPayload::from_data(bucket_type, data),
    })
}
