use std::path::Path;

use anyhow::Result;
use chrono::Local;
use tracing::info;

use crate::{
    daemon::{
        scheduling::run_cycle,
        storage::{routine_store::JsonRoutineStore, RoutineRepository},
    },
    routines::{compute_streaks, for_routine, TaskStatus},
    utils::clock::Clock,
};

use super::output::format_date_time;

/// Runs a single scheduling pass, the same one the daemon runs on every poll.
pub async fn process_schedule_command(dir: &Path, clock: &dyn Clock) -> Result<()> {
    let store = JsonRoutineStore::new(dir.to_path_buf())?;
    let evaluation = run_cycle(&store, clock.time(), &Local).await?;
    if evaluation.due.is_empty() {
        println!("Nothing is due");
    }
    for firing in &evaluation.due {
        println!(
            "{}\t{}\t{} tasks",
            format_date_time(firing.occurrence),
            firing.routine_id,
            firing.tasks.len()
        );
    }
    Ok(())
}

pub async fn process_tasks_command(dir: &Path, all: bool) -> Result<()> {
    let store = JsonRoutineStore::new(dir.to_path_buf())?;
    for task in store.load_tasks().await? {
        if task.status == TaskStatus::Done && !all {
            continue;
        }
        let status = match task.status {
            TaskStatus::Due => "due",
            TaskStatus::Done => "done",
        };
        println!(
            "{}\t{}\t{}\t{}\t{}",
            task.id,
            status,
            format_date_time(task.created_at),
            task.routine_id.as_deref().unwrap_or("-"),
            task.name
        );
    }
    Ok(())
}

pub async fn process_done_command(dir: &Path, task_id: &str, clock: &dyn Clock) -> Result<()> {
    let store = JsonRoutineStore::new(dir.to_path_buf())?;
    match store.complete_task(task_id, clock.time()).await? {
        Some(completion) => {
            info!("Recorded completion {:?}", completion);
            println!(
                "Completed routine {} ({} tasks)",
                completion.routine_id, completion.task_count
            );
        }
        None => println!("Task {task_id} is done"),
    }
    Ok(())
}

pub async fn process_streak_command(
    dir: &Path,
    routine: Option<&str>,
    clock: &dyn Clock,
) -> Result<()> {
    let store = JsonRoutineStore::new(dir.to_path_buf())?;
    let completions = store.load_completions().await?;
    let today = clock.time().with_timezone(&Local).date_naive();

    let routine_ids = match routine {
        Some(v) => vec![v.to_string()],
        None => {
            let mut ids = completions
                .iter()
                .map(|v| v.routine_id.clone())
                .collect::<Vec<_>>();
            ids.sort();
            ids.dedup();
            ids
        }
    };

    for id in routine_ids {
        let summary = compute_streaks(for_routine(&completions, &id), today, &Local);
        let span = summary
            .longest_span
            .map(|(start, end)| format!("{} - {}", start.format("%x"), end.format("%x")))
            .unwrap_or_else(|| "-".into());
        println!(
            "{id}\tcurrent {}\tlongest {}\t{span}",
            summary.current, summary.longest
        );
    }
    Ok(())
}
