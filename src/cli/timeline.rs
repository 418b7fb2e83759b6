use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{CommandFactory, Parser};

use crate::{
    events::{normalize, parse_export, NormalizeOptions},
    timeline::{chunk, merge, BlockOptions, BlockSize, DayBounds, TimeBlock},
    utils::percentage::{duration_percentage, Percentage},
};

use super::{
    dates::TimeArgs,
    output::{format_duration, format_time},
    Args,
};

#[derive(Debug, Parser)]
pub struct TimelineCommand {
    #[arg(long, short, help = "Exported event document")]
    file: PathBuf,
    #[arg(
        long,
        help = "Day to show. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\". Defaults to today"
    )]
    day: Option<String>,
    #[arg(short = 'd', long = "block", default_value_t = 15, help = "Block duration in minutes")]
    block_minutes: u32,
    #[arg(long = "no-merge", help = "Show every block instead of joining similar neighbours")]
    no_merge: bool,
    #[arg(long = "days-back", default_value_t = 7, help = "Ignore events older than this many days")]
    days_back: u32,
    #[arg(long = "min-duration", default_value_t = 0., help = "Ignore events shorter than this many seconds")]
    min_duration: f64,
    #[arg(long = "hide", help = "Activity names to hide. Can be repeated")]
    hidden: Vec<String>,
    #[arg(short = 'p', long = "percentage", help = "Skip blocks covered less than this", default_value = "0")]
    min_percentage: Percentage,
    #[arg(long, help = "Also show blocks without any events")]
    empty: bool,
}

/// Command to process `timeline` command. Timeline command shows which activity dominated every
/// block of a single day.
pub async fn process_timeline_command(command: TimelineCommand, time: &TimeArgs) -> Result<()> {
    let Some(block_size) = BlockSize::new_opt(command.block_minutes) else {
        return Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Can't create a block of {} minutes", command.block_minutes),
            )
            .into());
    };
    let clock = time.clock()?;
    let day = time.day(command.day.as_deref(), clock.as_ref())?;

    let document = tokio::fs::read_to_string(&command.file)
        .await
        .with_context(|| format!("Couldn't read {:?}", command.file))?;
    let buckets = parse_export(&document)?;

    let options = NormalizeOptions {
        days_back: command.days_back,
        min_duration_seconds: command.min_duration,
        hidden_names: command.hidden,
    };
    let events = normalize(&buckets, &options, clock.as_ref())
        .into_iter()
        .filter(|v| !v.hidden)
        .collect::<Vec<_>>();

    let block_options = BlockOptions {
        block_size,
        ..Default::default()
    };
    let blocks = chunk(
        &events,
        &block_options,
        Some(DayBounds::for_date(day, &Local)),
        &Local,
    );
    let blocks = if command.no_merge { blocks } else { merge(blocks) };

    println!("{}", day.format("%x"));
    for block in blocks {
        if block.is_empty() && !command.empty {
            continue;
        }
        let covered = duration_percentage(block.covered, block.end - block.start);
        if !block.is_empty() && covered < command.min_percentage {
            continue;
        }
        println!(
            "{}-{}\t{}%\t{}\t{}",
            format_time(block.start),
            format_time(block.end),
            *covered as i32,
            format_duration(block.covered),
            block_label(&block)
        );
    }
    Ok(())
}

fn block_label(block: &TimeBlock) -> String {
    match block.dominant_name() {
        None => "-".into(),
        Some(_) if block.afk_only || block.inactive_only => "Inactive".into(),
        Some(name) => name.to_string(),
    }
}
