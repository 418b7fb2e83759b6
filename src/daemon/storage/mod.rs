//!  Storage is organized through [routine_store::JsonRoutineStore].
//!  The basic idea is:
//!   - Everything lives in a single state directory.
//!   - Routine definitions are a JSON array edited by hand.
//!   - Tasks and completions are JSON lines, one entity per line.
//!   - The watermark is replaced atomically, so a crash leaves either the old or the new value.
//!   - Every read-modify-write of the directory holds an exclusive lock on `state.lock`, so the
//!     daemon and the CLI never interleave.

use anyhow::Result;
use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use tokio::fs::File;

use crate::routines::{Routine, SchedulerWatermark, Task};

pub mod routine_store;

/// Exclusive hold on the state of a repository. Dropping it also releases the lock, but
/// [StateLock::release] reports failures.
#[derive(Debug)]
pub struct StateLock {
    file: Option<File>,
}

impl StateLock {
    pub(crate) fn held(file: File) -> Self {
        Self { file: Some(file) }
    }

    /// For repositories that are not shared between processes.
    pub fn detached() -> Self {
        Self { file: None }
    }

    pub async fn release(mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.unlock_async().await?;
        }
        Ok(())
    }
}

/// Everything a scheduling cycle reads and writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoutineRepository: Send + Sync {
    /// Waits until no other process works with the same state.
    async fn lock_state(&self) -> Result<StateLock>;

    /// Returns [SchedulerWatermark::NEVER] when nothing was saved yet.
    async fn load_watermark(&self) -> Result<SchedulerWatermark>;

    async fn save_watermark(&self, watermark: SchedulerWatermark) -> Result<()>;

    async fn load_routines(&self) -> Result<Vec<Routine>>;

    async fn load_tasks(&self) -> Result<Vec<Task>>;

    async fn append_tasks(&self, tasks: Vec<Task>) -> Result<()>;
}
