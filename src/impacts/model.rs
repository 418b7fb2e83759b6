use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A manual check-in: "from now on I'm doing this". There is no end, the end is always the next
/// check-in or the end of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Impact {
    pub activity_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<HashMap<String, f64>>,
}

/// Part of an impact that falls into a single local day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationSegment {
    pub day: NaiveDate,
    pub goal_id: Option<String>,
    pub activity_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Ends at the moment of evaluation and grows as time passes.
    pub running: bool,
}

impl DurationSegment {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }
}
