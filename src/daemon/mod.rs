use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use chrono::Local;
use scheduling::Scheduler;
use storage::routine_store::JsonRoutineStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::utils::clock::DefaultClock;

pub mod args;
pub mod scheduling;
pub mod shutdown;
pub mod storage;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often routines are checked.
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf, config: SchedulerConfig) -> Result<()> {
    let shutdown_token = CancellationToken::new();

    let scheduler = create_scheduler(dir)?;
    info!("Checking routines every {:?}", config.poll_interval);

    let (_, scheduling_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        scheduler.run(shutdown_token, config.poll_interval),
    );

    if let Err(scheduling_result) = scheduling_result {
        error!("Scheduling module got an error {:?}", scheduling_result);
    }

    Ok(())
}

pub fn create_scheduler(dir: PathBuf) -> Result<Scheduler<Local>> {
    let store = JsonRoutineStore::new(dir)?;
    Ok(Scheduler::new(Box::new(store), Box::new(DefaultClock), Local))
}
