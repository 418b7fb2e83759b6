use std::{fmt::Display, ops::Deref, str::FromStr};

use anyhow::anyhow;
use chrono::Duration;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Percentage {
    pub fn new_opt(value: f64) -> Option<Percentage> {
        if value >= 0. {
            Some(Percentage(value))
        } else {
            None
        }
    }
}

impl FromStr for Percentage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // This means that 100%% also works, but I think I'm fine with that
        let s = s.trim_end_matches("%");
        let v = s.parse::<f64>()?;
        Percentage::new_opt(v).ok_or_else(|| anyhow!("Can't parse {s} into percentage"))
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Share of `whole` taken by `value`. An empty whole has nothing to share, so it's 0%.
pub fn duration_percentage(value: Duration, whole: Duration) -> Percentage {
    if whole <= Duration::zero() {
        return Percentage(0.);
    }
    Percentage(value.num_milliseconds().max(0) as f64 / whole.num_milliseconds() as f64 * 100.)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::{duration_percentage, Percentage};

    #[test]
    fn parses_with_and_without_sign() {
        assert_eq!("12.5%".parse::<Percentage>().unwrap(), Percentage(12.5));
        assert_eq!("3".parse::<Percentage>().unwrap(), Percentage(3.));
        assert!("-1".parse::<Percentage>().is_err());
        assert!("NaN".parse::<Percentage>().is_err());
    }

    #[test]
    fn shares_of_durations() {
        assert_eq!(
            *duration_percentage(Duration::minutes(3), Duration::minutes(12)),
            25.
        );
        assert_eq!(*duration_percentage(Duration::minutes(3), Duration::zero()), 0.);
    }
}
