use std::{collections::BTreeSet, iter::successors};

use chrono::{NaiveDate, TimeZone};

use crate::utils::time::local_date;

use super::model::RoutineCompletion;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreakSummary {
    /// Consecutive days ending today, or yesterday when today has nothing yet.
    pub current: u32,
    pub longest: u32,
    pub last_completion_date: Option<NaiveDate>,
    /// First and last day of the earliest run of `longest` days.
    pub longest_span: Option<(NaiveDate, NaiveDate)>,
}

pub fn for_routine<'a>(
    completions: &'a [RoutineCompletion],
    routine_id: &'a str,
) -> impl Iterator<Item = &'a RoutineCompletion> + 'a {
    completions.iter().filter(move |v| v.routine_id == routine_id)
}

/// Counts consecutive local days with at least one completion.
pub fn compute_streaks<'a, Tz: TimeZone>(
    completions: impl IntoIterator<Item = &'a RoutineCompletion>,
    today: NaiveDate,
    tz: &Tz,
) -> StreakSummary {
    let dates = completions
        .into_iter()
        .map(|v| local_date(v.completed_at_timestamp, tz))
        .collect::<BTreeSet<_>>();

    let Some(&last_completion_date) = dates.last() else {
        return StreakSummary::default();
    };

    let mut longest = 0;
    let mut longest_span = None;
    let mut run: Option<(NaiveDate, NaiveDate, u32)> = None;
    for &date in &dates {
        run = match run {
            Some((start, end, length)) if end.succ_opt() == Some(date) => {
                Some((start, date, length + 1))
            }
            _ => Some((date, date, 1)),
        };
        if let Some((start, end, length)) = run {
            // Strictly greater, so the earliest run wins a tie.
            if length > longest {
                longest = length;
                longest_span = Some((start, end));
            }
        }
    }

    let anchor = if dates.contains(&today) {
        Some(today)
    } else {
        today.pred_opt().filter(|v| dates.contains(v))
    };
    let current = anchor.map_or(0, |anchor| {
        successors(Some(anchor), |v| v.pred_opt())
            .take_while(|v| dates.contains(v))
            .count() as u32
    });

    StreakSummary {
        current,
        longest,
        last_completion_date: Some(last_completion_date),
        longest_span,
    }
}
