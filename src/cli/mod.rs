pub mod dates;
pub mod durations;
pub mod output;
pub mod routines;
pub mod timeline;

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use dates::TimeArgs;
use durations::{process_durations_command, DurationsCommand};
use routines::{
    process_done_command, process_schedule_command, process_streak_command,
    process_tasks_command,
};
use timeline::{process_timeline_command, TimelineCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{start_daemon, SchedulerConfig},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "impactlog", version, long_about = None)]
#[command(about = "Activity timelines, time attribution and routine tracking", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[command(flatten)]
    time: TimeArgs,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Display a timeline of an exported activity log")]
    Timeline {
        #[command(flatten)]
        command: TimelineCommand,
    },
    #[command(about = "Display time attributed to goals from manual check-ins")]
    Durations {
        #[command(flatten)]
        command: DurationsCommand,
    },
    #[command(about = "Display routine completion streaks")]
    Streak {
        #[arg(long, help = "Only this routine")]
        routine: Option<String>,
    },
    #[command(about = "Check routines once and create the tasks that are due")]
    Schedule {},
    #[command(about = "List tasks")]
    Tasks {
        #[arg(long, help = "Include finished tasks")]
        all: bool,
    },
    #[command(about = "Mark a task as done")]
    Done { task_id: String },
    #[command(
        about = "Run the scheduler directly in current console. Used for debugging and for running under a service manager"
    )]
    Serve {
        #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..), help = "Seconds between routine checks")]
        poll: u64,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = args.dir.map_or_else(create_application_default_path, Ok)?;
    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &dir, logging_level, args.log)?;

    match args.commands {
        Commands::Timeline { command } => process_timeline_command(command, &args.time).await,
        Commands::Durations { command } => process_durations_command(command, &args.time).await,
        Commands::Streak { routine } => {
            let clock = args.time.clock()?;
            process_streak_command(&dir, routine.as_deref(), clock.as_ref()).await
        }
        Commands::Schedule {} => {
            let clock = args.time.clock()?;
            process_schedule_command(&dir, clock.as_ref()).await
        }
        Commands::Tasks { all } => process_tasks_command(&dir, all).await,
        Commands::Done { task_id } => {
            let clock = args.time.clock()?;
            process_done_command(&dir, &task_id, clock.as_ref()).await
        }
        Commands::Serve { poll } => {
            start_daemon(
                dir,
                SchedulerConfig {
                    poll_interval: Duration::from_secs(poll),
                },
            )
            .await
        }
    }
}
