//! Timestamp formatting for reports and log file names.

use chrono::{DateTime, Local, TimeZone, Utc};

/// Format used for push times in every report line
pub const PUSH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format used in run log file names
pub const RUN_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Render a push time, or `-` when the registry did not report one
pub fn format_push_time(pushed_at: Option<DateTime<Utc>>) -> String {
    match pushed_at {
        Some(ts) => ts.format(PUSH_TIME_FORMAT).to_string(),
        None => "-".to_string(),
    }
}

/// Log file name for a run started at `started`
pub fn log_file_name<Tz: TimeZone>(started: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("ecr_cleaner_app_{}.log", started.format(RUN_STAMP_FORMAT))
}

/// Log file name for a run starting now
pub fn current_log_file_name() -> String {
    log_file_name(&Local::now())
}

/// Convert epoch seconds and nanoseconds as reported by the AWS SDK
pub fn from_epoch(secs: i64, nanos: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_push_time() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_push_time(Some(ts)), "2024-03-09T07:05:01Z");
    }

    #[test]
    fn test_format_missing_push_time() {
        assert_eq!(format_push_time(None), "-");
    }

    #[test]
    fn test_log_file_name() {
        let started = Utc.with_ymd_and_hms(2025, 1, 15, 13, 4, 59).unwrap();
        assert_eq!(
            log_file_name(&started),
            "ecr_cleaner_app_20250115_130459.log"
        );
    }

    #[test]
    fn test_from_epoch() {
        let ts = from_epoch(1_700_000_000, 0).unwrap();
        assert_eq!(format_push_time(Some(ts)), "2023-11-14T22:13:20Z");
    }
}
