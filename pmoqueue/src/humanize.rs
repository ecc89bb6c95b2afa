//! Relative, human readable renderings of time offsets

use chrono::Duration;

/// Renders a signed offset from now: positive is in the future
///
/// ```
/// use chrono::Duration;
/// use pmoqueue::humanize;
///
/// assert_eq!(humanize(Duration::minutes(20)), "in 20 minutes");
/// assert_eq!(humanize(Duration::hours(-2)), "2 hours ago");
/// ```
pub fn humanize(delta: Duration) -> String {
    let secs = delta.num_seconds();
    let abs = secs.unsigned_abs();

    let amount = match abs {
        0..=9 => return "just now".to_string(),
        10..=44 => "seconds".to_string(),
        45..=89 => "a minute".to_string(),
        90..=2699 => format!("{} minutes", (abs / 60).max(2)),
        2700..=5399 => "an hour".to_string(),
        5400..=79199 => format!("{} hours", (abs / 3600).max(2)),
        79200..=129599 => "a day".to_string(),
        129600..=2246399 => format!("{} days", (abs / 86400).max(2)),
        2246400..=3887999 => "a month".to_string(),
        3888000..=27647999 => format!("{} months", (abs / 2592000).max(2)),
        27648000..=47347199 => "a year".to_string(),
        _ => format!("{} years", (abs / 31536000).max(2)),
    };

    if secs > 0 {
        format!("in {}", amount)
    } else {
        format!("{} ago", amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_and_past_offsets() {
        assert_eq!(humanize(Duration::seconds(3)), "just now");
        assert_eq!(humanize(Duration::seconds(30)), "in seconds");
        assert_eq!(humanize(Duration::seconds(-60)), "a minute ago");
        assert_eq!(humanize(Duration::minutes(20)), "in 20 minutes");
        assert_eq!(humanize(Duration::minutes(-50)), "an hour ago");
        assert_eq!(humanize(Duration::hours(5)), "in 5 hours");
        assert_eq!(humanize(Duration::days(-1)), "a day ago");
        assert_eq!(humanize(Duration::days(10)), "in 10 days");
        assert_eq!(humanize(Duration::days(-400)), "a year ago");
    }
}
