use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A recurring set of tasks. Without a cron expression the routine is only ever started by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskTemplate>,
    #[serde(default)]
    pub goal_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Due,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routine_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routine_instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// All tasks of one routine instance were finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineCompletion {
    pub routine_id: String,
    pub routine_instance_id: String,
    pub completed_at_timestamp: DateTime<Utc>,
    pub task_count: usize,
}

/// Moment up to which routines were already checked, in epoch milliseconds. Zero means routines
/// were never checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerWatermark {
    pub last_checked_timestamp: i64,
}

impl SchedulerWatermark {
    pub const NEVER: SchedulerWatermark = SchedulerWatermark {
        last_checked_timestamp: 0,
    };

    pub fn at(moment: DateTime<Utc>) -> Self {
        Self {
            last_checked_timestamp: moment.timestamp_millis(),
        }
    }

    pub fn is_never(&self) -> bool {
        self.last_checked_timestamp == 0
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        if self.is_never() {
            return None;
        }
        Utc.timestamp_millis_opt(self.last_checked_timestamp).single()
    }
}

/// Returns the completion record of a routine instance once every one of its tasks is done.
/// `at` is the moment of the last completion.
pub fn completion_for_instance(
    tasks: &[Task],
    routine_instance_id: &str,
    at: DateTime<Utc>,
) -> Option<RoutineCompletion> {
    let instance = tasks
        .iter()
        .filter(|v| v.routine_instance_id.as_deref() == Some(routine_instance_id))
        .collect::<Vec<_>>();
    let routine_id = instance.first()?.routine_id.clone()?;
    if instance.iter().any(|v| v.status != TaskStatus::Done) {
        return None;
    }
    Some(RoutineCompletion {
        routine_id,
        routine_instance_id: routine_instance_id.to_string(),
        completed_at_timestamp: at,
        task_count: instance.len(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{completion_for_instance, SchedulerWatermark, Task, TaskStatus};

    fn task(id: &str, instance: &str, status: TaskStatus) -> Task {
        Task {
            id: id.into(),
            name: id.into(),
            description: None,
            status,
            routine_id: Some("morning".into()),
            routine_instance_id: Some(instance.into()),
            goal_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 4, 8, 8, 0, 0).unwrap(),
            completed_at: None,
        }
    }

    #[test]
    fn completion_needs_every_task() {
        let at = Utc.with_ymd_and_hms(2024, 4, 8, 9, 0, 0).unwrap();
        let mut tasks = vec![
            task("stretch", "a", TaskStatus::Done),
            task("water", "a", TaskStatus::Due),
            task("stretch", "b", TaskStatus::Due),
        ];
        assert!(completion_for_instance(&tasks, "a", at).is_none());

        tasks[1].status = TaskStatus::Done;
        let completion = completion_for_instance(&tasks, "a", at).unwrap();
        assert_eq!(completion.routine_id, "morning");
        assert_eq!(completion.task_count, 2);
        assert!(completion_for_instance(&tasks, "missing", at).is_none());
    }

    #[test]
    fn watermark_round_trips_through_json() {
        let watermark: SchedulerWatermark =
            serde_json::from_str(r#"{"lastCheckedTimestamp": 0}"#).unwrap();
        assert!(watermark.is_never());
        assert_eq!(watermark.as_datetime(), None);

        let at = Utc.with_ymd_and_hms(2024, 4, 8, 9, 0, 0).unwrap();
        assert_eq!(SchedulerWatermark::at(at).as_datetime(), Some(at));
    }
}
