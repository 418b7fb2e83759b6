use chrono::{DateTime, Duration, Local, Utc};

pub fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}

pub fn format_time(v: DateTime<Utc>) -> String {
    v.with_timezone(&Local).format("%H:%M").to_string()
}

pub fn format_date_time(v: DateTime<Utc>) -> String {
    v.with_timezone(&Local).format("%x %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::format_duration;

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::seconds(42)), "42s");
        assert_eq!(format_duration(Duration::seconds(125)), "2m5s");
        assert_eq!(format_duration(Duration::minutes(420)), "7h0m0s");
        assert_eq!(format_duration(Duration::zero()), "0s");
    }
}
