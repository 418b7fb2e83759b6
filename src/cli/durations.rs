use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, Local};
use clap::Parser;

use crate::{
    impacts::{attribute, Breakdown, Impact},
    utils::percentage::duration_percentage,
};

use super::{
    dates::TimeArgs,
    output::{format_date_time, format_duration},
};

#[derive(Debug, Parser)]
pub struct DurationsCommand {
    #[arg(long, short, help = "JSON array of impacts")]
    file: PathBuf,
    #[arg(
        long,
        help = "Only show this day. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    day: Option<String>,
    #[arg(long, help = "Also list every attributed segment")]
    segments: bool,
}

/// Prints how much time every goal got per day, based on manual check-ins.
pub async fn process_durations_command(command: DurationsCommand, time: &TimeArgs) -> Result<()> {
    let clock = time.clock()?;
    let day = match command.day.as_deref() {
        Some(v) => Some(time.day(Some(v), clock.as_ref())?),
        None => None,
    };

    let document = tokio::fs::read_to_string(&command.file)
        .await
        .with_context(|| format!("Couldn't read {:?}", command.file))?;
    let impacts: Vec<Impact> = serde_json::from_str(&document)
        .with_context(|| format!("{:?} is not a list of impacts", command.file))?;

    let segments = attribute(&impacts, &Local, clock.as_ref())
        .into_iter()
        .filter(|v| day.map_or(true, |day| v.day == day))
        .collect::<Vec<_>>();

    if command.segments {
        for segment in &segments {
            println!(
                "{}\t{}\t{}\t{}{}",
                format_date_time(segment.start),
                format_duration(segment.duration()),
                segment.goal_id.as_deref().unwrap_or("-"),
                segment.activity_name,
                if segment.running { " (running)" } else { "" }
            );
        }
        println!();
    }

    // Printed right away, so the running segment is included.
    let breakdown = Breakdown::from_segments(&segments, true);
    for (day, total) in &breakdown.by_day {
        println!("{}\t{}", day.format("%x"), format_duration(*total));
        let goals = breakdown
            .by_day_and_goal
            .range((*day, None)..)
            .take_while(|((v, _), _)| v == day);
        for ((_, goal), duration) in goals {
            print_share(goal.as_deref().unwrap_or("Untagged"), *duration, *total);
        }
        println!();
    }

    let total = breakdown.total();
    println!("Total\t{}", format_duration(total));
    for (activity, duration) in &breakdown.by_activity {
        print_share(activity, *duration, total);
    }
    Ok(())
}

fn print_share(name: &str, duration: Duration, whole: Duration) {
    println!(
        "\t{}%\t{}\t{}",
        *duration_percentage(duration, whole) as i32,
        format_duration(duration),
        name
    );
}
