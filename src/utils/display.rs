use chrono::{DateTime, Duration, TimeZone, Utc};

fn fit_with_remainder(dividend: u64, divisor: u64) -> (u64, u64) {
    let fit = dividend / divisor;
    let remainder = dividend % divisor;
    (fit, remainder)
}

pub fn get_elapsed_time<Tz>(time: DateTime<Tz>) -> Duration
where
    Tz: TimeZone,
{
    Utc::now().signed_duration_since(time)
}

/// Given a duration, format like "00:00:00"
pub fn format_elapsed_time(elapsed: Duration) -> String {
    let elapsed = elapsed.num_seconds().abs() as u64;
    let (hours, remainder) = fit_with_remainder(elapsed, 3600);
    let (minutes, seconds) = fit_with_remainder(remainder, 60);
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Given a timestamp, get the elapsed time and return formatted string
pub fn format_time_as_elapsed<Tz>(time: DateTime<Tz>) -> String
where
    Tz: TimeZone,
{
    format_elapsed_time(get_elapsed_time(time))
}

/// Render an AS path like "3 2 1"
pub fn as_path_to_string(path: &[u32]) -> String {
    itertools::join(path, " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed_time() {
        assert_eq!(format_elapsed_time(Duration::seconds(3725)), "01:02:05");
        assert_eq!(format_elapsed_time(Duration::seconds(-59)), "00:00:59");
    }

    #[test]
    fn test_as_path_to_string() {
        assert_eq!(as_path_to_string(&[3, 2, 1]), "3 2 1");
        assert_eq!(as_path_to_string(&[]), "");
    }
}
