//! Next-fire-time calculation.
//!
//! Weeks are anchored on Sunday: a weekly alarm resolves to its day within
//! the Sunday-to-Saturday week containing the reference time, then rolls
//! forward a week if that instant is not strictly in the future.

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, Weekday};
use klaxon_api::AlarmKind;
use klaxon_util::{TimeOfDay, add_calendar_days, local_at};

/// Fire time to install when an alarm of `kind` is (re)configured at `reference_now`.
pub fn initial_fire_time(kind: &AlarmKind, reference_now: DateTime<Local>) -> DateTime<Local> {
    match kind {
        AlarmKind::OneTime { fire_at } => *fire_at,
        AlarmKind::Daily { time } => next_daily(*time, reference_now),
        AlarmKind::Weekly { day, time } => next_weekly(*day, *time, reference_now),
    }
}

/// Today at `time`, or tomorrow if that is not after `reference_now`.
pub fn next_daily(time: TimeOfDay, reference_now: DateTime<Local>) -> DateTime<Local> {
    let today = reference_now.date_naive();
    let candidate = local_at(today, time);
    if candidate > reference_now {
        return candidate;
    }
    local_at(shift_date(today, 1), time)
}

/// `day` at `time` in the current Sunday-based week, or a week later if
/// that is not after `reference_now`.
pub fn next_weekly(day: Weekday, time: TimeOfDay, reference_now: DateTime<Local>) -> DateTime<Local> {
    let today = reference_now.date_naive();
    let offset =
        day.num_days_from_sunday() as i64 - today.weekday().num_days_from_sunday() as i64;
    let date = shift_date(today, offset);

    let candidate = local_at(date, time);
    if candidate > reference_now {
        return candidate;
    }
    local_at(shift_date(date, 7), time)
}

/// Anchor for the next cycle after a recurring alarm is dismissed.
///
/// Always advances from the previous anchor, never from the dismissal time.
/// Returns `None` for one-time alarms.
pub fn advance(kind: &AlarmKind, old_default: DateTime<Local>) -> Option<DateTime<Local>> {
    kind.period_days()
        .map(|days| add_calendar_days(&old_default, days))
}

fn shift_date(date: NaiveDate, days: i64) -> NaiveDate {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days as u64))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn hm(h: u8, m: u8) -> TimeOfDay {
        TimeOfDay::hm(h, m).unwrap()
    }

    // 2025-01-15 is a Wednesday.

    #[test]
    fn daily_later_today() {
        let now = at(2025, 1, 15, 6, 0, 0);
        assert_eq!(next_daily(hm(7, 0), now), at(2025, 1, 15, 7, 0, 0));
    }

    #[test]
    fn daily_already_passed_rolls_to_tomorrow() {
        let now = at(2025, 1, 15, 7, 0, 1);
        assert_eq!(next_daily(hm(7, 0), now), at(2025, 1, 16, 7, 0, 0));
    }

    #[test]
    fn daily_at_exact_time_is_already_past() {
        let now = at(2025, 1, 15, 7, 0, 0);
        assert_eq!(next_daily(hm(7, 0), now), at(2025, 1, 16, 7, 0, 0));
    }

    #[test]
    fn daily_rolls_over_month_end() {
        let now = at(2025, 1, 31, 23, 0, 0);
        assert_eq!(next_daily(hm(6, 30), now), at(2025, 2, 1, 6, 30, 0));
    }

    #[test]
    fn weekly_earlier_in_week_goes_to_next_week() {
        // Monday 08:00 seen from Wednesday 10:00
        let now = at(2025, 1, 15, 10, 0, 0);
        assert_eq!(
            next_weekly(Weekday::Mon, hm(8, 0), now),
            at(2025, 1, 20, 8, 0, 0)
        );
    }

    #[test]
    fn weekly_later_in_week() {
        let now = at(2025, 1, 15, 10, 0, 0);
        assert_eq!(
            next_weekly(Weekday::Fri, hm(8, 0), now),
            at(2025, 1, 17, 8, 0, 0)
        );
    }

    #[test]
    fn weekly_same_day_before_and_after() {
        let now = at(2025, 1, 15, 10, 0, 0);
        assert_eq!(
            next_weekly(Weekday::Wed, hm(11, 0), now),
            at(2025, 1, 15, 11, 0, 0)
        );
        assert_eq!(
            next_weekly(Weekday::Wed, hm(10, 0), now),
            at(2025, 1, 22, 10, 0, 0)
        );
    }

    #[test]
    fn weekly_sunday_from_saturday_is_tomorrow() {
        // Saturday 2025-01-18; the week's Sunday (01-12) is past
        let now = at(2025, 1, 18, 12, 0, 0);
        assert_eq!(
            next_weekly(Weekday::Sun, hm(9, 0), now),
            at(2025, 1, 19, 9, 0, 0)
        );
    }

    #[test]
    fn weekly_saturday_from_sunday_is_six_days_out() {
        let now = at(2025, 1, 12, 12, 0, 0);
        assert_eq!(
            next_weekly(Weekday::Sat, hm(9, 0), now),
            at(2025, 1, 18, 9, 0, 0)
        );
    }

    #[test]
    fn one_time_is_taken_verbatim_even_in_the_past() {
        let now = at(2025, 1, 15, 10, 0, 0);
        let past = at(2024, 12, 25, 7, 0, 0);
        let kind = AlarmKind::OneTime { fire_at: past };
        assert_eq!(initial_fire_time(&kind, now), past);
    }

    #[test]
    fn advance_uses_period_from_previous_anchor() {
        let anchor = at(2025, 1, 15, 7, 0, 0);
        let daily = AlarmKind::Daily { time: hm(7, 0) };
        let weekly = AlarmKind::Weekly {
            day: Weekday::Wed,
            time: hm(7, 0),
        };
        let once = AlarmKind::OneTime { fire_at: anchor };

        assert_eq!(advance(&daily, anchor), Some(at(2025, 1, 16, 7, 0, 0)));
        assert_eq!(advance(&weekly, anchor), Some(at(2025, 1, 22, 7, 0, 0)));
        assert_eq!(advance(&once, anchor), None);
    }
}
