pub mod cron;
pub mod model;
pub mod scheduler;
pub mod streak;

pub use cron::{CronError, CronSchedule};
pub use model::{
    completion_for_instance, Routine, RoutineCompletion, SchedulerWatermark, Task, TaskStatus,
    TaskTemplate,
};
pub use scheduler::{evaluate, Evaluation, RoutineFiring};
pub use streak::{compute_streaks, for_routine, StreakSummary};
