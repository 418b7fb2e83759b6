use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tracing::{instrument, trace};

use crate::{
    events::NormalizedEvent,
    utils::time::{local_date, local_day_end, local_day_start},
};

pub const DEFAULT_BLOCK_MINUTES: u32 = 15;

/// Width of a timeline block. Blocks are aligned to multiples of this width counted from local
/// midnight, so the width is limited to a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSize {
    minutes: u32,
}

impl BlockSize {
    pub fn new_opt(minutes: u32) -> Option<Self> {
        match minutes {
            1..=1440 => Some(Self { minutes }),
            _ => None,
        }
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn as_duration(&self) -> Duration {
        Duration::minutes(self.minutes as i64)
    }
}

impl Default for BlockSize {
    fn default() -> Self {
        Self {
            minutes: DEFAULT_BLOCK_MINUTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockOptions {
    pub block_size: BlockSize,
    /// Activities that mean nothing on their own, like an idle or lock screen. Compared ignoring
    /// ascii case.
    pub sentinel_names: Vec<String>,
}

impl Default for BlockOptions {
    fn default() -> Self {
        Self {
            block_size: BlockSize::default(),
            sentinel_names: vec!["idle".into(), "LockApp".into(), "loginwindow".into()],
        }
    }
}

impl BlockOptions {
    pub fn is_sentinel(&self, name: &str) -> bool {
        self.sentinel_names
            .iter()
            .any(|v| v.eq_ignore_ascii_case(name))
    }
}

/// Explicit `[start, end)` range for [chunk].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayBounds {
    pub fn for_date<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Self {
        Self {
            start: local_day_start(date, tz),
            end: local_day_end(date, tz),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeBlock {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Activity that occupied the block the most. `None` only for empty blocks.
    pub dominant: Option<NormalizedEvent>,
    /// The block only has away/active events; `dominant` is just a representative and shouldn't
    /// be rendered as an activity.
    pub afk_only: bool,
    /// Every non-afk event of the block is a sentinel activity.
    pub inactive_only: bool,
    /// Events overlapping the block, clipped to it.
    pub members: Vec<NormalizedEvent>,
    /// Length of the union of member intervals.
    pub covered: Duration,
}

impl TimeBlock {
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn covered_seconds(&self) -> f64 {
        self.covered.num_milliseconds() as f64 / 1000.
    }

    pub fn dominant_name(&self) -> Option<&str> {
        self.dominant.as_ref().map(|v| &*v.display_name)
    }
}

/// Splits events into fixed blocks. With `bounds` the blocks exactly tile the bounds, otherwise
/// they cover everything from the aligned start of the earliest event to the end of the latest
/// one. Blocks never cross local midnight and windows without events are kept as empty blocks, so
/// the output has no gaps.
#[instrument(skip(events, options, tz), fields(events = events.len()))]
pub fn chunk<Tz: TimeZone>(
    events: &[NormalizedEvent],
    options: &BlockOptions,
    bounds: Option<DayBounds>,
    tz: &Tz,
) -> Vec<TimeBlock> {
    let (range_start, range_end) = match bounds {
        Some(DayBounds { start, end }) => (start, end),
        None => {
            let (Some(first), Some(last)) = (
                events.iter().map(|v| v.timestamp).min(),
                events.iter().map(|v| v.end()).max(),
            ) else {
                return vec![];
            };
            (aligned_floor(first, options.block_size, tz), last)
        }
    };

    let mut blocks = vec![];
    let mut start = range_start;
    while start < range_end {
        let day_end = local_day_end(local_date(start, tz), tz);
        let end = (aligned_floor(start, options.block_size, tz) + options.block_size.as_duration())
            .min(day_end)
            .min(range_end);
        trace!("Block {start} {end}");
        blocks.push(build_block(start, end, events, options));
        start = end;
    }
    blocks
}

/// Floors `instant` to a multiple of `size` counted from its local midnight.
pub fn aligned_floor<Tz: TimeZone>(
    instant: DateTime<Utc>,
    size: BlockSize,
    tz: &Tz,
) -> DateTime<Utc> {
    let day_start = local_day_start(local_date(instant, tz), tz);
    let minutes = (instant - day_start).num_minutes();
    day_start + Duration::minutes(minutes - minutes % size.minutes() as i64)
}

fn build_block(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    events: &[NormalizedEvent],
    options: &BlockOptions,
) -> TimeBlock {
    let members = events
        .iter()
        .filter_map(|v| v.clamp(start, end))
        .collect::<Vec<_>>();

    let (dominant, afk_only) = match select_dominant(&members, options) {
        Some(dominant) => (Some(dominant.clone()), false),
        None => (members.iter().find(|v| v.is_afk()).cloned(), !members.is_empty()),
    };
    let inactive_only = !members.is_empty()
        && members
            .iter()
            .filter(|v| !v.is_afk())
            .all(|v| options.is_sentinel(&v.display_name));

    TimeBlock {
        start,
        end,
        dominant,
        afk_only,
        inactive_only,
        covered: union_length(&members),
        members,
    }
}

/// Picks the non-afk member with the longest overlap. Sentinel activities only win when nothing
/// else is there. Ties go to the member that started first in the block, then to input order.
fn select_dominant<'a>(
    members: &'a [NormalizedEvent],
    options: &BlockOptions,
) -> Option<&'a NormalizedEvent> {
    let candidates = members.iter().filter(|v| !v.is_afk()).collect::<Vec<_>>();
    let meaningful = candidates
        .iter()
        .copied()
        .filter(|v| !options.is_sentinel(&v.display_name))
        .collect::<Vec<_>>();
    let pool = if meaningful.is_empty() {
        candidates
    } else {
        meaningful
    };

    // `max_by` returns the last of equal elements, hence the reversed comparison on start time
    // and the search over the reversed pool.
    pool.into_iter().rev().max_by(|a, b| {
        a.duration()
            .cmp(&b.duration())
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    })
}

fn union_length(members: &[NormalizedEvent]) -> Duration {
    let mut intervals = members
        .iter()
        .map(|v| (v.timestamp, v.end()))
        .collect::<Vec<_>>();
    intervals.sort();

    let mut total = Duration::zero();
    let mut current: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    for (start, end) in intervals {
        current = match current {
            Some((current_start, current_end)) if start <= current_end => {
                Some((current_start, current_end.max(end)))
            }
            Some((current_start, current_end)) => {
                total += current_end - current_start;
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((start, end)) = current {
        total += end - start;
    }
    total
}
