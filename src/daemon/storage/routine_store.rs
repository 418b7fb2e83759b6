use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs4::tokio::AsyncFileExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::routines::{
    completion_for_instance, Routine, RoutineCompletion, SchedulerWatermark, Task, TaskStatus,
};

use super::{RoutineRepository, StateLock};

pub const ROUTINES_FILE: &str = "routines.json";
pub const TASKS_FILE: &str = "tasks.jsonl";
pub const COMPLETIONS_FILE: &str = "completions.jsonl";
pub const WATERMARK_FILE: &str = "watermark.json";
pub const STATE_LOCK_FILE: &str = "state.lock";

/// The main realization of [RoutineRepository].
pub struct JsonRoutineStore {
    dir: PathBuf,
}

impl JsonRoutineStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    pub async fn load_completions(&self) -> Result<Vec<RoutineCompletion>> {
        read_lines(&self.dir.join(COMPLETIONS_FILE)).await
    }

    /// Marks a task as done. Finishing the last open task of a routine instance also records a
    /// completion, which is returned.
    pub async fn complete_task(
        &self,
        task_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<RoutineCompletion>> {
        let lock = self.lock_state().await?;
        let result = self.complete_task_locked(task_id, at).await;
        lock.release().await?;
        result
    }

    async fn complete_task_locked(
        &self,
        task_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<RoutineCompletion>> {
        let mut tasks = self.load_tasks().await?;
        let task = tasks
            .iter_mut()
            .find(|v| v.id == task_id)
            .ok_or_else(|| anyhow!("No task with id {task_id}"))?;
        if task.status == TaskStatus::Done {
            bail!("Task {task_id} is already done");
        }
        task.status = TaskStatus::Done;
        task.completed_at = Some(at);
        let instance_id = task.routine_instance_id.clone();

        let mut buffer = Vec::<u8>::new();
        for task in &tasks {
            serde_json::to_writer(&mut buffer, task)?;
            buffer.push(b'\n');
        }
        write_atomically(&self.dir.join(TASKS_FILE), &buffer).await?;

        let completion = instance_id.and_then(|v| completion_for_instance(&tasks, &v, at));
        if let Some(completion) = &completion {
            debug!("Routine instance {} is complete", completion.routine_instance_id);
            append_lines(&self.dir.join(COMPLETIONS_FILE), std::slice::from_ref(completion))
                .await?;
        }
        Ok(completion)
    }
}

#[async_trait]
impl RoutineRepository for JsonRoutineStore {
    async fn lock_state(&self) -> Result<StateLock> {
        let path = self.dir.join(STATE_LOCK_FILE);
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await
            .with_context(|| format!("Couldn't open {path:?}"))?;
        file.lock_exclusive()?;
        debug!("Holding {path:?}");
        Ok(StateLock::held(file))
    }

    async fn load_watermark(&self) -> Result<SchedulerWatermark> {
        let path = self.dir.join(WATERMARK_FILE);
        match tokio::fs::read(&path).await {
            Ok(v) => serde_json::from_slice(&v)
                .with_context(|| format!("Watermark in {path:?} is corrupted")),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(SchedulerWatermark::NEVER),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_watermark(&self, watermark: SchedulerWatermark) -> Result<()> {
        let buffer = serde_json::to_vec(&watermark)?;
        write_atomically(&self.dir.join(WATERMARK_FILE), &buffer).await
    }

    async fn load_routines(&self) -> Result<Vec<Routine>> {
        let path = self.dir.join(ROUTINES_FILE);
        match tokio::fs::read(&path).await {
            Ok(v) => serde_json::from_slice(&v)
                .with_context(|| format!("Routines in {path:?} are corrupted")),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_tasks(&self) -> Result<Vec<Task>> {
        read_lines(&self.dir.join(TASKS_FILE)).await
    }

    async fn append_tasks(&self, tasks: Vec<Task>) -> Result<()> {
        append_lines(&self.dir.join(TASKS_FILE), &tasks).await
    }
}

async fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    async fn extract<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, std::io::Error> {
        debug!("Extracting {path:?}");
        let file = File::open(path).await?;
        file.lock_shared()?;
        let buffer = BufReader::new(file);
        let mut lines = buffer.lines();
        let mut items = vec![];
        while let Some(v) = lines.next_line().await? {
            if v.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(&v) {
                Ok(v) => items.push(v),
                Err(e) => {
                    // A write cut off by a shutdown leaves a broken last line.
                    warn!("During parsing in path {path:?} found illegal json string {v}: {e}")
                }
            }
        }

        lines.into_inner().into_inner().unlock_async().await?;

        Ok(items)
    }

    match extract::<T>(path).await {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
        Err(e) => Err(e)?,
    }
}

async fn append_lines<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let mut buffer = Vec::<u8>::new();
    for item in items {
        serde_json::to_writer(&mut buffer, item)?;
        buffer.push(b'\n');
    }

    let mut file = File::options()
        .append(true)
        .create(true)
        .open(path)
        .await?;
    file.lock_exclusive()?;
    let result = async {
        file.write_all(&buffer).await?;
        file.flush().await
    }
    .await;
    file.unlock_async().await?;
    Ok(result?)
}

/// Writes into a sibling file first and renames it over `path`.
async fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use super::{JsonRoutineStore, COMPLETIONS_FILE, ROUTINES_FILE, STATE_LOCK_FILE, TASKS_FILE};
    use crate::{
        daemon::storage::RoutineRepository,
        routines::{SchedulerWatermark, Task, TaskStatus},
        utils::logging::TEST_LOGGING,
    };

    fn task(id: &str, instance: &str) -> Task {
        Task {
            id: id.into(),
            name: id.into(),
            description: None,
            status: TaskStatus::Due,
            routine_id: Some("morning".into()),
            routine_instance_id: Some(instance.into()),
            goal_id: Some("health".into()),
            created_at: Utc.with_ymd_and_hms(2024, 4, 8, 8, 0, 0).unwrap(),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn missing_files_are_empty() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let store = JsonRoutineStore::new(dir.path().join("state"))?;

        assert_eq!(store.load_watermark().await?, SchedulerWatermark::NEVER);
        assert!(store.load_routines().await?.is_empty());
        assert!(store.load_tasks().await?.is_empty());
        assert!(store.load_completions().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn watermark_is_replaced() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonRoutineStore::new(dir.path().to_path_buf())?;
        let at = Utc.with_ymd_and_hms(2024, 4, 8, 8, 0, 30).unwrap();

        store.save_watermark(SchedulerWatermark::at(at)).await?;
        store
            .save_watermark(SchedulerWatermark::at(at + chrono::Duration::minutes(1)))
            .await?;
        assert_eq!(
            store.load_watermark().await?.as_datetime(),
            Some(at + chrono::Duration::minutes(1))
        );

        let files = std::fs::read_dir(dir.path())?.count();
        assert_eq!(files, 1);
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_lines_are_skipped() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonRoutineStore::new(dir.path().to_path_buf())?;
        store.append_tasks(vec![task("stretch", "a")]).await?;

        let path = dir.path().join(TASKS_FILE);
        let mut contents = std::fs::read_to_string(&path)?;
        contents.push_str("{\"id\": \"cut of");
        std::fs::write(&path, contents)?;

        let tasks = store.load_tasks().await?;
        assert_eq!(tasks, vec![task("stretch", "a")]);
        Ok(())
    }

    #[tokio::test]
    async fn reads_routine_definitions() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(
            dir.path().join(ROUTINES_FILE),
            r#"[{
                "id": "morning",
                "name": "Morning",
                "cronExpression": "0 8 * * *",
                "tasks": [{"name": "Stretch"}, {"name": "Water", "description": "A glass"}],
                "goalIds": ["health"]
            }, {"id": "manual", "name": "Manual"}]"#,
        )?;
        let store = JsonRoutineStore::new(dir.path().to_path_buf())?;

        let routines = store.load_routines().await?;
        assert_eq!(routines.len(), 2);
        assert_eq!(routines[0].cron_expression.as_deref(), Some("0 8 * * *"));
        assert_eq!(routines[0].tasks[1].description.as_deref(), Some("A glass"));
        assert!(routines[1].tasks.is_empty());

        std::fs::write(dir.path().join(ROUTINES_FILE), "[{")?;
        assert!(store.load_routines().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn completing_the_last_task_records_completion() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonRoutineStore::new(dir.path().to_path_buf())?;
        store
            .append_tasks(vec![task("stretch", "a"), task("water", "a"), task("read", "b")])
            .await?;
        let at = Utc.with_ymd_and_hms(2024, 4, 8, 9, 0, 0).unwrap();

        assert_eq!(store.complete_task("stretch", at).await?, None);
        assert!(store.complete_task("stretch", at).await.is_err());
        assert!(store.complete_task("missing", at).await.is_err());

        let completion = store.complete_task("water", at).await?.unwrap();
        assert_eq!(completion.routine_instance_id, "a");
        assert_eq!(completion.task_count, 2);
        assert_eq!(store.load_completions().await?, vec![completion]);

        let tasks = store.load_tasks().await?;
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].completed_at, Some(at));
        assert_eq!(tasks[2].status, TaskStatus::Due);
        assert!(dir.path().join(COMPLETIONS_FILE).exists());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn completion_waits_for_the_state_lock() -> Result<()> {
        let dir = tempdir()?;
        let store = Arc::new(JsonRoutineStore::new(dir.path().to_path_buf())?);
        store
            .append_tasks(vec![task("stretch", "a"), task("water", "a")])
            .await?;
        let at = Utc.with_ymd_and_hms(2024, 4, 8, 9, 0, 0).unwrap();

        let lock = store.lock_state().await?;
        assert!(dir.path().join(STATE_LOCK_FILE).exists());
        let completing = tokio::spawn({
            let store = store.clone();
            async move { store.complete_task("stretch", at).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        // Appended by a scheduling pass while `done` is waiting.
        store.append_tasks(vec![task("read", "b")]).await?;
        assert!(!completing.is_finished());
        lock.release().await?;

        assert_eq!(completing.await??, None);
        let tasks = store.load_tasks().await?;
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].status, TaskStatus::Done);
        assert_eq!(tasks[2].id, "read");
        Ok(())
    }
}
