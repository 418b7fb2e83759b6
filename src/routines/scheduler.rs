use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::utils::time::{local_date, local_day_start};

use super::{
    cron::CronSchedule,
    model::{Routine, SchedulerWatermark, Task, TaskStatus},
};

/// A routine that is due in this pass, with the tasks it spawns.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineFiring {
    pub routine_id: String,
    pub routine_instance_id: String,
    pub occurrence: DateTime<Utc>,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub due: Vec<RoutineFiring>,
    /// Only to be persisted once the new tasks are stored.
    pub next_watermark: SchedulerWatermark,
}

impl Evaluation {
    pub fn new_tasks(&self) -> impl Iterator<Item = &Task> {
        self.due.iter().flat_map(|v| v.tasks.iter())
    }
}

/// Decides which routines fire between the watermark and `now`. Cron expressions are evaluated in
/// `tz`, which also decides where "today" starts for the duplicate guard.
#[instrument(
    skip_all,
    fields(routines = routines.len(), watermark = watermark.last_checked_timestamp)
)]
pub fn evaluate<Tz: TimeZone>(
    routines: &[Routine],
    existing_tasks: &[Task],
    watermark: SchedulerWatermark,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Evaluation {
    let today_start = local_day_start(local_date(now, tz), tz);

    let due = routines
        .iter()
        .filter_map(|routine| {
            let expression = routine.cron_expression.as_deref().map(str::trim)?;
            if expression.is_empty() || routine.tasks.is_empty() {
                return None;
            }

            if already_created_today(routine, existing_tasks, today_start) {
                debug!("Routine {} already has due tasks for today", routine.id);
                return None;
            }

            let schedule = match expression.parse::<CronSchedule>() {
                Ok(v) => v,
                Err(e) => {
                    warn!("Skipping routine {} with cron `{expression}`: {e}", routine.id);
                    return None;
                }
            };

            let occurrence = match watermark.as_datetime() {
                None => schedule.first_at_or_after(today_start, tz),
                Some(last) => schedule.next_after(last, tz),
            }?;
            if occurrence > now {
                return None;
            }

            debug!("Routine {} is due at {occurrence}", routine.id);
            Some(fire(routine, occurrence, now))
        })
        .collect::<Vec<_>>();

    Evaluation {
        due,
        next_watermark: SchedulerWatermark::at(now),
    }
}

fn already_created_today(
    routine: &Routine,
    existing_tasks: &[Task],
    today_start: DateTime<Utc>,
) -> bool {
    existing_tasks.iter().any(|task| {
        task.status == TaskStatus::Due
            && task.routine_id.as_deref() == Some(routine.id.as_str())
            && task.created_at >= today_start
            && routine.tasks.iter().any(|v| v.name == task.name)
    })
}

fn fire(routine: &Routine, occurrence: DateTime<Utc>, now: DateTime<Utc>) -> RoutineFiring {
    let routine_instance_id = Uuid::new_v4().to_string();
    let goal_id = routine.goal_ids.first().cloned();
    let tasks = routine
        .tasks
        .iter()
        .map(|template| Task {
            id: Uuid::new_v4().to_string(),
            name: template.name.clone(),
            description: template.description.clone(),
            status: TaskStatus::Due,
            routine_id: Some(routine.id.clone()),
            routine_instance_id: Some(routine_instance_id.clone()),
            goal_id: goal_id.clone(),
            created_at: now,
            completed_at: None,
        })
        .collect();

    RoutineFiring {
        routine_id: routine.id.clone(),
        routine_instance_id,
        occurrence,
        tasks,
    }
}
