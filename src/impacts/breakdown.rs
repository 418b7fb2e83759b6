use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use super::model::DurationSegment;

/// Totals of attributed time. Untagged segments are reported under the `None` goal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breakdown {
    pub by_day: BTreeMap<NaiveDate, Duration>,
    pub by_goal: BTreeMap<Option<String>, Duration>,
    pub by_day_and_goal: BTreeMap<(NaiveDate, Option<String>), Duration>,
    pub by_activity: BTreeMap<String, Duration>,
}

impl Breakdown {
    /// Running segments grow with time. Leave them out of anything that gets stored and isn't
    /// refreshed continuously.
    pub fn from_segments(segments: &[DurationSegment], include_running: bool) -> Self {
        let mut breakdown = Breakdown::default();
        for segment in segments.iter().filter(|v| include_running || !v.running) {
            let duration = segment.duration();
            *breakdown.by_day.entry(segment.day).or_insert_with(Duration::zero) += duration;
            *breakdown
                .by_goal
                .entry(segment.goal_id.clone())
                .or_insert_with(Duration::zero) += duration;
            *breakdown
                .by_day_and_goal
                .entry((segment.day, segment.goal_id.clone()))
                .or_insert_with(Duration::zero) += duration;
            *breakdown
                .by_activity
                .entry(segment.activity_name.clone())
                .or_insert_with(Duration::zero) += duration;
        }
        breakdown
    }

    pub fn total(&self) -> Duration {
        self.by_day.values().fold(Duration::zero(), |ac, v| ac + *v)
    }

    pub fn goal_total(&self, goal_id: &str) -> Duration {
        self.by_goal
            .get(&Some(goal_id.to_string()))
            .copied()
            .unwrap_or_else(Duration::zero)
    }

    /// Days of a single goal, in chronological order.
    pub fn goal_days(&self, goal_id: &str) -> Vec<(NaiveDate, Duration)> {
        self.by_day_and_goal
            .iter()
            .filter(|((_, goal), _)| goal.as_deref() == Some(goal_id))
            .map(|((day, _), duration)| (*day, *duration))
            .collect()
    }
}
