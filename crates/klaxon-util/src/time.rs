//! Wall-clock time utilities for klaxon
//!
//! Alarms are scheduled against the host's local clock. Everything in the
//! scheduling core takes `now` as a parameter; [`now`] is only called by the
//! daemon's tick loop and by clients.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `KLAXON_MOCK_TIME` environment variable can be set
//! to shift the clock seen by [`now`]. The mock clock keeps advancing at the
//! real rate, which makes it easy to watch an alarm go off without waiting
//! for the real time of day.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 06:59:50`)
//!
//! ```bash
//! KLAXON_MOCK_TIME="2025-12-25 06:59:50" klaxond
//! ```

use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "KLAXON_MOCK_TIME";

/// Accepted layout for `KLAXON_MOCK_TIME` and one-time alarm timestamps
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Offset between mock time and real time, computed once per process.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let raw = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            match parse_local_datetime(&raw) {
                Some(mock_dt) => {
                    let offset = mock_dt.signed_duration_since(chrono::Local::now());
                    tracing::info!(
                        mock_time = %raw,
                        offset_secs = offset.num_seconds(),
                        "Mock time enabled"
                    );
                    Some(offset)
                }
                None => {
                    tracing::warn!(
                        mock_time = %raw,
                        expected_format = DATETIME_FORMAT,
                        "Invalid mock time, using the real clock"
                    );
                    None
                }
            }
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // the one sanctioned wrapper around Local::now()
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();
    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Format a DateTime the way the alarm list shows the clock.
pub fn format_clock_time(dt: &DateTime<Local>) -> String {
    dt.format("%H:%M:%S").to_string()
}

/// Format a DateTime for display with full date and time.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Map a naive local date-time onto the host time zone.
///
/// Ambiguous times (clocks going back) resolve to the earlier instant. Times
/// that fall into a DST gap move forward until they exist.
pub fn resolve_local(naive: NaiveDateTime) -> DateTime<Local> {
    let mut candidate = naive;
    // DST gaps are at most a couple of hours wide.
    for _ in 0..4 {
        if let Some(dt) = Local.from_local_datetime(&candidate).earliest() {
            return dt;
        }
        candidate += chrono::Duration::minutes(30);
    }
    Local.from_utc_datetime(&naive)
}

/// Local midnight-relative instant of `time` on `date`.
pub fn local_at(date: NaiveDate, time: TimeOfDay) -> DateTime<Local> {
    resolve_local(date.and_time(time.to_naive_time()))
}

/// Advance `dt` by whole calendar days, keeping its wall-clock time of day.
///
/// Across a DST change this is not a multiple of 24 hours, which is what an
/// alarm set for 07:00 needs.
pub fn add_calendar_days(dt: &DateTime<Local>, days: u64) -> DateTime<Local> {
    match dt.naive_local().checked_add_days(Days::new(days)) {
        Some(naive) => resolve_local(naive),
        None => *dt + chrono::Duration::days(days as i64),
    }
}

/// Parse `YYYY-MM-DD HH:MM[:SS]` as a local date-time.
pub fn parse_local_datetime(s: &str) -> Option<DateTime<Local>> {
    let s = s.trim();
    let naive = NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .ok()?;
    Local.from_local_datetime(&naive).earliest()
}

/// Parse a day name: `mon`, `Monday`, `TUE`, ...
pub fn parse_weekday(s: &str) -> Option<Weekday> {
    let day = match s.trim().to_lowercase().as_str() {
        "mon" | "monday" => Weekday::Mon,
        "tue" | "tues" | "tuesday" => Weekday::Tue,
        "wed" | "wednesday" => Weekday::Wed,
        "thu" | "thur" | "thurs" | "thursday" => Weekday::Thu,
        "fri" | "friday" => Weekday::Fri,
        "sat" | "saturday" => Weekday::Sat,
        "sun" | "sunday" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

/// Full English name of a weekday
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Time of day an alarm goes off, to the second.
///
/// Serialized as `"HH:MM:SS"`; parsed from `"HH:MM"` or `"HH:MM:SS"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8, second: u8) -> Option<Self> {
        if hour < 24 && minute < 60 && second < 60 {
            Some(Self {
                hour,
                minute,
                second,
            })
        } else {
            None
        }
    }

    pub fn hm(hour: u8, minute: u8) -> Option<Self> {
        Self::new(hour, minute, 0)
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_num_seconds_from_midnight_opt(self.as_seconds_from_midnight(), 0)
            .unwrap_or(NaiveTime::MIN)
    }

    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            second: time.second() as u8,
        }
    }

    /// Returns seconds since midnight
    pub fn as_seconds_from_midnight(&self) -> u32 {
        (self.hour as u32) * 3600 + (self.minute as u32) * 60 + self.second as u32
    }
}

impl PartialOrd for TimeOfDay {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeOfDay {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_seconds_from_midnight()
            .cmp(&other.as_seconds_from_midnight())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 2 && parts.len() != 3 {
            return Err("Expected HH:MM or HH:MM:SS format".into());
        }

        let field = |idx: usize, name: &str| -> Result<u8, String> {
            parts[idx]
                .parse::<u8>()
                .map_err(|_| format!("Invalid {}", name))
        };

        let hour = field(0, "hour")?;
        let minute = field(1, "minute")?;
        let second = if parts.len() == 3 { field(2, "second")? } else { 0 };

        if hour >= 24 {
            return Err("Hour must be 0-23".into());
        }
        if minute >= 60 {
            return Err("Minute must be 0-59".into());
        }
        if second >= 60 {
            return Err("Second must be 0-59".into());
        }

        Ok(Self {
            hour,
            minute,
            second,
        })
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_time_of_day_ordering() {
        let morning = TimeOfDay::hm(8, 0).unwrap();
        let noon = TimeOfDay::hm(12, 0).unwrap();
        let noon_and_a_bit = TimeOfDay::new(12, 0, 1).unwrap();

        assert!(morning < noon);
        assert!(noon < noon_and_a_bit);
    }

    #[test]
    fn test_time_of_day_rejects_out_of_range() {
        assert!(TimeOfDay::new(24, 0, 0).is_none());
        assert!(TimeOfDay::new(0, 60, 0).is_none());
        assert!(TimeOfDay::new(0, 0, 60).is_none());
    }

    #[test]
    fn test_time_of_day_parse() {
        assert_eq!("07:30".parse::<TimeOfDay>().unwrap(), TimeOfDay::hm(7, 30).unwrap());
        assert_eq!(
            "23:59:59".parse::<TimeOfDay>().unwrap(),
            TimeOfDay::new(23, 59, 59).unwrap()
        );

        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("7".parse::<TimeOfDay>().is_err());
        assert!("aa:bb".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_time_of_day_serializes_as_string() {
        let t = TimeOfDay::hm(7, 5).unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"07:05:00\"");

        let parsed: TimeOfDay = serde_json::from_str("\"06:45\"").unwrap();
        assert_eq!(parsed, TimeOfDay::hm(6, 45).unwrap());

        assert!(serde_json::from_str::<TimeOfDay>("\"25:00\"").is_err());
    }

    #[test]
    fn test_parse_weekday() {
        assert_eq!(parse_weekday("mon"), Some(Weekday::Mon));
        assert_eq!(parse_weekday("Sunday"), Some(Weekday::Sun));
        assert_eq!(parse_weekday(" THU "), Some(Weekday::Thu));
        assert_eq!(parse_weekday("someday"), None);
    }

    #[test]
    fn test_add_calendar_days_keeps_time_of_day() {
        let dt = Local.with_ymd_and_hms(2025, 12, 29, 7, 0, 0).unwrap();
        let later = add_calendar_days(&dt, 7);
        assert_eq!(later.date_naive(), NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        assert_eq!(later.hour(), 7);
        assert_eq!(later.minute(), 0);
    }

    #[test]
    fn test_local_at() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 25).unwrap();
        let dt = local_at(date, TimeOfDay::new(6, 30, 15).unwrap());
        assert_eq!(dt.day(), 25);
        assert_eq!(TimeOfDay::from_naive_time(dt.time()), TimeOfDay::new(6, 30, 15).unwrap());
    }

    #[test]
    fn test_parse_local_datetime() {
        let dt = parse_local_datetime("2025-12-25 14:30:00").unwrap();
        assert_eq!(format_datetime_full(&dt), "2025-12-25 14:30:00");

        let dt = parse_local_datetime("2025-12-25 14:30").unwrap();
        assert_eq!(format_clock_time(&dt), "14:30:00");

        for bad in ["2025-12-25", "14:30:00", "2025/12/25 14:30:00", "", "not a date"] {
            assert!(parse_local_datetime(bad).is_none(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(300)), "5m 0s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
    }

    #[test]
    fn test_now_returns_time() {
        let t = now();
        assert!(t.year() >= 2020);
    }

    #[test]
    fn test_weekday_name() {
        assert_eq!(weekday_name(Weekday::Wed), "Wednesday");
    }
}
