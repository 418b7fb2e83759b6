use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    routines::{evaluate, Evaluation},
    utils::clock::Clock,
};

use super::storage::RoutineRepository;

/// Reads everything a pass needs, evaluates routines and stores the result. Any failure abandons
/// the cycle before the watermark is touched, so the next cycle retries the same window.
///
/// The whole pass holds the repository's state lock.
#[instrument(skip(repository, tz))]
pub async fn run_cycle<Tz: TimeZone>(
    repository: &dyn RoutineRepository,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<Evaluation> {
    let lock = repository
        .lock_state()
        .await
        .context("Couldn't lock the state")?;
    let result = evaluate_and_store(repository, now, tz).await;
    lock.release().await?;
    result
}

async fn evaluate_and_store<Tz: TimeZone>(
    repository: &dyn RoutineRepository,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<Evaluation> {
    let watermark = repository
        .load_watermark()
        .await
        .context("Couldn't read the watermark")?;
    let routines = repository
        .load_routines()
        .await
        .context("Couldn't read routines")?;
    let tasks = repository
        .load_tasks()
        .await
        .context("Couldn't read tasks")?;

    let evaluation = evaluate(&routines, &tasks, watermark, now, tz);

    let new_tasks = evaluation.new_tasks().cloned().collect::<Vec<_>>();
    if !new_tasks.is_empty() {
        debug!("Saving {} new tasks", new_tasks.len());
        repository
            .append_tasks(new_tasks)
            .await
            .context("Couldn't save new tasks")?;
    }

    repository
        .save_watermark(evaluation.next_watermark)
        .await
        .context("Couldn't save the watermark")?;

    Ok(evaluation)
}

/// Runs scheduling cycles one at a time.
pub struct Scheduler<Tz> {
    repository: Box<dyn RoutineRepository>,
    time_provider: Box<dyn Clock>,
    tz: Tz,
    active: Mutex<()>,
}

impl<Tz: TimeZone> Scheduler<Tz> {
    pub fn new(
        repository: Box<dyn RoutineRepository>,
        time_provider: Box<dyn Clock>,
        tz: Tz,
    ) -> Self {
        Self {
            repository,
            time_provider,
            tz,
            active: Mutex::new(()),
        }
    }

    /// Runs a single cycle. Returns `None` when another cycle is still in progress.
    pub async fn tick(&self) -> Result<Option<Evaluation>> {
        let Ok(_active) = self.active.try_lock() else {
            warn!("Previous scheduling cycle is still running, skipping");
            return Ok(None);
        };
        let now = self.time_provider.time();
        run_cycle(self.repository.as_ref(), now, &self.tz)
            .await
            .map(Some)
    }

    /// Executes the scheduling loop until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken, poll: Duration) -> Result<()> {
        let mut tick_point = self.time_provider.instant();
        loop {
            tick_point += poll;

            match self.tick().await {
                Ok(Some(evaluation)) => {
                    for firing in &evaluation.due {
                        info!(
                            "Routine {} fired for {} with {} tasks",
                            firing.routine_id,
                            firing.occurrence,
                            firing.tasks.len()
                        );
                    }
                }
                Ok(None) => (),
                Err(e) => {
                    error!("Scheduling cycle was abandoned {e:?}")
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(tick_point) => ()
            }
        }
    }
}
