use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};
use now::DateTimeNow;

use crate::utils::clock::{Clock, DefaultClock, FixedClock};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

/// Options shared by every command that looks at "today".
#[derive(Debug, Clone, clap::Args)]
pub struct TimeArgs {
    #[arg(
        long,
        global = true,
        help = "Pretend that the current moment is this. Examples are \"yesterday\", \"1 hour ago\", \"12:00 16/03/2025\""
    )]
    now: Option<String>,
    #[arg(long, global = true, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

impl TimeArgs {
    pub fn clock(&self) -> Result<Box<dyn Clock>> {
        match &self.now {
            Some(v) => {
                let now = parse_human_date(v, Local::now(), self.date_style, "now")?;
                Ok(Box::new(FixedClock(now.to_utc())))
            }
            None => Ok(Box::new(DefaultClock)),
        }
    }

    /// Local date described by `value`, relative to the clock. Defaults to today.
    pub fn day(&self, value: Option<&str>, clock: &dyn Clock) -> Result<NaiveDate> {
        let now = clock.time().with_timezone(&Local);
        match value {
            Some(v) => Ok(parse_human_date(v, now, self.date_style, "day")?
                .beginning_of_day()
                .date_naive()),
            None => Ok(now.date_naive()),
        }
    }
}

fn parse_human_date(
    value: &str,
    now: DateTime<Local>,
    style: DateStyle,
    name: &str,
) -> Result<DateTime<Local>> {
    match parse_date_string(value, now, style.into()) {
        Ok(v) => Ok(v.with_timezone(&Local)),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate {name} date {e}"),
            )
            .into()),
    }
}
